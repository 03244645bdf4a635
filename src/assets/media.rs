use std::path::Path;

use serde::Deserialize;

use crate::error::{ReelError, ReelResult};

/// What ffprobe reports about a media file.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaInfo {
    pub duration_sec: f64,
    pub has_video: bool,
    pub has_audio: bool,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

pub fn probe_media(path: &Path) -> ReelResult<MediaInfo> {
    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| ReelError::encode(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(ReelError::encode(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    parse_probe_json(&out.stdout)
}

/// Duration in seconds of an audio or video file.
pub fn probe_duration_secs(path: &Path) -> ReelResult<f64> {
    let info = probe_media(path)?;
    if info.duration_sec <= 0.0 {
        return Err(ReelError::encode(format!(
            "ffprobe reported no duration for '{}'",
            path.display()
        )));
    }
    Ok(info.duration_sec)
}

fn parse_probe_json(bytes: &[u8]) -> ReelResult<MediaInfo> {
    let parsed: ProbeOut = serde_json::from_slice(bytes)
        .map_err(|e| ReelError::encode(format!("ffprobe json parse failed: {e}")))?;
    let has = |kind: &str| {
        parsed
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some(kind))
    };
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite())
        .unwrap_or(0.0);
    Ok(MediaInfo {
        duration_sec,
        has_video: has("video"),
        has_audio: has("audio"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_streams_and_duration() {
        let json = br#"{
            "streams": [{"codec_type": "video"}, {"codec_type": "audio"}],
            "format": {"duration": "3.021333"}
        }"#;
        let info = parse_probe_json(json).unwrap();
        assert!(info.has_video && info.has_audio);
        assert!((info.duration_sec - 3.021333).abs() < 1e-9);
    }

    #[test]
    fn missing_duration_is_zero() {
        let info = parse_probe_json(br#"{"streams": [{"codec_type": "audio"}]}"#).unwrap();
        assert_eq!(info.duration_sec, 0.0);
        assert!(!info.has_video);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_probe_json(b"not json").is_err());
    }
}
