use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use tracing::debug;

use crate::{
    config::Config,
    error::{ReelError, ReelResult},
};

/// Sample rate every intermediate clip is resampled to.
pub const AUDIO_SAMPLE_RATE: u32 = 44_100;

/// Track timescale pinned on intermediate MP4s so the concat demuxer can stream-copy them.
const TRACK_TIMESCALE: u32 = 90_000;

/// Encoding parameters shared by every clip produced in one run.
#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Codec for the final export. Intermediate clips always use libx264.
    pub video_codec: String,
    pub preset: Option<String>,
    pub audio_codec: String,
    pub overwrite: bool,
}

impl EncodeConfig {
    pub fn from_config(cfg: &Config, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fps: cfg.settings.fps,
            video_codec: cfg.settings.video_codec.clone(),
            preset: cfg.settings.codec_preset.clone(),
            audio_codec: cfg.settings.audio_codec.clone(),
            overwrite: true,
        }
    }

    pub fn validate(&self) -> ReelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelError::config("encode width/height must be non-zero"));
        }
        if self.fps == 0 {
            return Err(ReelError::config("encode fps must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(ReelError::config(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.video_codec.trim().is_empty() || self.audio_codec.trim().is_empty() {
            return Err(ReelError::config("encode codecs must be non-empty"));
        }
        Ok(())
    }

    /// Arguments that make an intermediate clip concat-compatible with every other one.
    pub fn intermediate_args(&self) -> Vec<String> {
        let fps = self.fps.to_string();
        let timescale = TRACK_TIMESCALE.to_string();
        let rate = AUDIO_SAMPLE_RATE.to_string();
        [
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-r",
            fps.as_str(),
            "-video_track_timescale",
            timescale.as_str(),
            "-c:a",
            "aac",
            "-ar",
            rate.as_str(),
            "-ac",
            "2",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Arguments for the final export with the configured codec.
    pub fn export_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.video_codec.clone()];
        if let Some(preset) = &self.preset {
            args.push("-preset".to_string());
            args.push(preset.clone());
        }
        for a in [
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            self.audio_codec.as_str(),
            "-movflags",
            "+faststart",
        ] {
            args.push(a.to_string());
        }
        args
    }

    /// Scale filter that forces the canvas size.
    pub fn canvas_filter(&self) -> String {
        format!(
            "scale={}:{},setsar=1,fps={},format=yuv420p",
            self.width, self.height, self.fps
        )
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    tool_runs("ffmpeg")
}

/// Both `ffmpeg` and `ffprobe` can be spawned.
pub fn ffmpeg_tools_available() -> bool {
    tool_runs("ffmpeg") && tool_runs("ffprobe")
}

fn tool_runs(name: &str) -> bool {
    Command::new(name)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// One ffmpeg invocation. Arguments are appended in order; the output path goes last.
pub struct FfmpegJob {
    args: Vec<OsString>,
}

impl FfmpegJob {
    pub fn new(overwrite: bool) -> Self {
        let mut args: Vec<OsString> = vec![if overwrite { "-y" } else { "-n" }.into()];
        args.extend(["-loglevel", "error"].map(OsString::from));
        Self { args }
    }

    pub fn arg(mut self, a: impl Into<OsString>) -> Self {
        self.args.push(a.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn input(self, path: &Path) -> Self {
        self.arg("-i").arg(path)
    }

    pub fn arg_list(&self) -> &[OsString] {
        &self.args
    }

    /// Run to completion, writing `out`. Non-zero exit turns stderr into the error message.
    pub fn run(self, out: &Path) -> ReelResult<()> {
        ensure_parent_dir(out)?;
        debug!(args = ?self.args, out = %out.display(), "running ffmpeg");

        let output = Command::new("ffmpeg")
            .args(&self.args)
            .arg(out)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                ReelError::encode(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelError::encode(format!(
                "ffmpeg exited with status {} writing '{}': {}",
                output.status,
                out.display(),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Hold a still image for `duration_secs` with a silent stereo track.
pub fn still_clip(
    image: &Path,
    duration_secs: f64,
    out: &Path,
    cfg: &EncodeConfig,
) -> ReelResult<PathBuf> {
    cfg.validate()?;
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(ReelError::encode("still clip duration must be positive"));
    }
    let t = format!("{duration_secs:.3}");
    FfmpegJob::new(cfg.overwrite)
        .args(["-loop", "1", "-framerate"])
        .arg(cfg.fps.to_string())
        .args(["-t", t.as_str()])
        .input(image)
        .args(["-f", "lavfi", "-t", t.as_str(), "-i"])
        .arg(format!("anullsrc=r={AUDIO_SAMPLE_RATE}:cl=stereo"))
        .args(["-map", "0:v:0", "-map", "1:a:0", "-vf"])
        .arg(cfg.canvas_filter())
        .args(["-tune", "stillimage"])
        .args(cfg.intermediate_args())
        .args(["-t", t.as_str()])
        .run(out)?;
    Ok(out.to_path_buf())
}

/// Re-encode an external clip (the intro) onto the run's canvas and intermediate format.
/// Clips without audio get a silent track so the demuxer concat keeps both streams aligned.
pub fn normalize_clip(
    input: &Path,
    has_audio: bool,
    out: &Path,
    cfg: &EncodeConfig,
) -> ReelResult<PathBuf> {
    cfg.validate()?;
    let mut job = FfmpegJob::new(cfg.overwrite).input(input);
    if has_audio {
        job = job.args(["-map", "0:v:0", "-map", "0:a:0"]);
    } else {
        job = job
            .args(["-f", "lavfi", "-i"])
            .arg(format!("anullsrc=r={AUDIO_SAMPLE_RATE}:cl=stereo"))
            .args(["-map", "0:v:0", "-map", "1:a:0", "-shortest"]);
    }
    job.arg("-vf")
        .arg(cfg.canvas_filter())
        .args(cfg.intermediate_args())
        .run(out)?;
    Ok(out.to_path_buf())
}
