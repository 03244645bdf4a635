//! The final pass over a concatenated sequence: branding, music, title and export.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use rand::{Rng, seq::SliceRandom as _};
use tracing::{info, warn};

use crate::{
    encode_ffmpeg::{EncodeConfig, FfmpegJob},
    error::ReelResult,
};

pub const MUSIC_VOLUME: f64 = 0.12;
pub const MUSIC_FADE_SECS: f64 = 2.0;
pub const TITLE_OVERLAY_SECS: f64 = 1.0;

/// Optional layers applied on top of the sequence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FinalLayers {
    /// Drawn bottom-center for the whole sequence.
    pub logo: Option<PathBuf>,
    /// Looped under the existing audio; requires a known sequence duration.
    pub music: Option<PathBuf>,
    /// Full-canvas transparent image shown for the first second.
    pub title_overlay: Option<PathBuf>,
    pub duration_secs: Option<f64>,
}

/// ffmpeg arguments (without the output path) that render `sequence` with `layers`.
pub fn plan_final_pass(sequence: &Path, layers: &FinalLayers, cfg: &EncodeConfig) -> Vec<OsString> {
    let mut args = vec![OsString::from("-i"), OsString::from(sequence)];
    let mut graph: Vec<String> = Vec::new();
    let mut next_input = 1usize;
    let mut video = "0:v".to_string();
    let mut audio_mixed = false;

    if let Some(logo) = &layers.logo {
        args.extend([OsString::from("-i"), OsString::from(logo)]);
        graph.push(format!("[{video}][{next_input}:v]overlay=(W-w)/2:H-h[vlogo]"));
        video = "vlogo".to_string();
        next_input += 1;
    }

    if let Some(title) = &layers.title_overlay {
        args.extend([OsString::from("-i"), OsString::from(title)]);
        graph.push(format!(
            "[{video}][{next_input}:v]overlay=0:0:enable='between(t,0,{TITLE_OVERLAY_SECS})'[vtitle]"
        ));
        video = "vtitle".to_string();
        next_input += 1;
    }

    if let (Some(music), Some(duration)) = (&layers.music, layers.duration_secs) {
        args.extend(["-stream_loop", "-1", "-i"].map(OsString::from));
        args.push(OsString::from(music));
        let mut bgm = format!(
            "[{next_input}:a]volume={MUSIC_VOLUME},atrim=0:{duration:.3},asetpts=PTS-STARTPTS"
        );
        if duration > MUSIC_FADE_SECS {
            bgm.push_str(&format!(
                ",afade=t=out:st={:.3}:d={MUSIC_FADE_SECS}",
                duration - MUSIC_FADE_SECS
            ));
        }
        graph.push(format!("{bgm}[bgm]"));
        // amix halves both inputs; scale back so the dialogue keeps its level.
        graph.push(
            "[0:a][bgm]amix=inputs=2:duration=first:dropout_transition=0,volume=2[aout]"
                .to_string(),
        );
        audio_mixed = true;
    }

    if !graph.is_empty() {
        args.push(OsString::from("-filter_complex"));
        args.push(OsString::from(graph.join(";")));
    }
    let video_map = if video == "0:v" {
        "0:v:0".to_string()
    } else {
        format!("[{video}]")
    };
    let audio_map = if audio_mixed { "[aout]" } else { "0:a:0" };
    args.extend([
        OsString::from("-map"),
        OsString::from(video_map),
        OsString::from("-map"),
        OsString::from(audio_map),
    ]);
    args.extend(cfg.export_args().into_iter().map(OsString::from));
    args
}

pub fn run_final_pass(
    sequence: &Path,
    layers: &FinalLayers,
    out: &Path,
    cfg: &EncodeConfig,
) -> ReelResult<PathBuf> {
    cfg.validate()?;
    info!(
        out = %out.display(),
        logo = layers.logo.is_some(),
        music = layers.music.is_some(),
        title = layers.title_overlay.is_some(),
        "exporting final video"
    );
    FfmpegJob::new(cfg.overwrite)
        .args(plan_final_pass(sequence, layers, cfg))
        .run(out)?;
    Ok(out.to_path_buf())
}

/// Pick a random `.mp3` from `dir`. `None` when the directory is missing or has no music.
pub fn pick_music<R: Rng + ?Sized>(dir: &Path, rng: &mut R) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "music directory unavailable");
            return None;
        }
    };
    let mut tracks: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("mp3"))
        })
        .collect();
    tracks.sort();
    let picked = tracks.choose(rng).cloned();
    if picked.is_none() {
        warn!(dir = %dir.display(), "no background music found");
    }
    picked
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn cfg() -> EncodeConfig {
        EncodeConfig {
            width: 1080,
            height: 1920,
            fps: 30,
            video_codec: "libx264".to_string(),
            preset: None,
            audio_codec: "aac".to_string(),
            overwrite: true,
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn value_after(args: &[String], flag: &str) -> String {
        let i = args.iter().position(|a| a == flag).unwrap();
        args[i + 1].clone()
    }

    #[test]
    fn bare_pass_maps_streams_directly() {
        let args = strings(&plan_final_pass(
            Path::new("seq.mp4"),
            &FinalLayers::default(),
            &cfg(),
        ));
        assert!(!args.iter().any(|a| a == "-filter_complex"));
        assert_eq!(args[..2], ["-i", "seq.mp4"]);
        assert_eq!(value_after(&args, "-map"), "0:v:0");
        assert!(args.iter().any(|a| a == "0:a:0"));
        assert_eq!(value_after(&args, "-c:v"), "libx264");
    }

    #[test]
    fn all_layers_chain_in_order() {
        let layers = FinalLayers {
            logo: Some(PathBuf::from("logo.png")),
            music: Some(PathBuf::from("song.mp3")),
            title_overlay: Some(PathBuf::from("title.png")),
            duration_secs: Some(10.0),
        };
        let args = strings(&plan_final_pass(Path::new("seq.mp4"), &layers, &cfg()));
        let graph = value_after(&args, "-filter_complex");
        assert!(graph.starts_with("[0:v][1:v]overlay=(W-w)/2:H-h[vlogo];"));
        assert!(graph.contains("[vlogo][2:v]overlay=0:0:enable='between(t,0,1)'[vtitle]"));
        assert!(graph.contains("[3:a]volume=0.12,atrim=0:10.000"));
        assert!(graph.contains("afade=t=out:st=8.000:d=2"));
        assert!(graph.ends_with("[aout]"));
        assert_eq!(value_after(&args, "-stream_loop"), "-1");
        let maps: Vec<&String> = args
            .iter()
            .enumerate()
            .filter(|(i, _)| *i > 0 && args[i - 1] == "-map")
            .map(|(_, a)| a)
            .collect();
        assert_eq!(maps, ["[vtitle]", "[aout]"]);
    }

    #[test]
    fn short_sequences_skip_the_fade_and_unknown_duration_skips_music() {
        let mut layers = FinalLayers {
            music: Some(PathBuf::from("song.mp3")),
            duration_secs: Some(1.5),
            ..FinalLayers::default()
        };
        let args = strings(&plan_final_pass(Path::new("seq.mp4"), &layers, &cfg()));
        assert!(!value_after(&args, "-filter_complex").contains("afade"));

        layers.duration_secs = None;
        let args = strings(&plan_final_pass(Path::new("seq.mp4"), &layers, &cfg()));
        assert!(!args.iter().any(|a| a == "song.mp3"));
    }

    #[test]
    fn music_pick_only_considers_mp3_files() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "storyreel_music_{}_{nanos}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(pick_music(&dir, &mut rng).is_none());

        std::fs::write(dir.join("intro.mp4"), b"x").unwrap();
        std::fs::write(dir.join("Calm.MP3"), b"x").unwrap();
        for _ in 0..5 {
            let picked = pick_music(&dir, &mut rng).unwrap();
            assert!(picked.ends_with("Calm.MP3"));
        }
        assert!(pick_music(&dir.join("missing"), &mut rng).is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
