//! Per-line video segments and their lossless concatenation.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing::{error, info, warn};

use crate::{
    encode_ffmpeg::{EncodeConfig, FfmpegJob},
    error::{Batch, ReelError, ReelResult},
    script::Script,
};

pub const MANIFEST_NAME: &str = "file_list.txt";

/// Loop a still image for the length of `audio` and mux both into one MP4.
///
/// With a known `duration_secs` the output is cut to exactly that length; otherwise the audio
/// end decides via `-shortest`.
pub fn build_segment(
    image: &Path,
    audio: &Path,
    duration_secs: Option<f64>,
    out: &Path,
    cfg: &EncodeConfig,
) -> ReelResult<PathBuf> {
    cfg.validate()?;
    let mut job = FfmpegJob::new(cfg.overwrite)
        .args(["-loop", "1", "-framerate"])
        .arg(cfg.fps.to_string())
        .input(image)
        .input(audio)
        .args(["-map", "0:v:0", "-map", "1:a:0", "-vf"])
        .arg(cfg.canvas_filter())
        .args(["-tune", "stillimage"])
        .args(cfg.intermediate_args())
        .arg("-shortest");
    if let Some(d) = duration_secs.filter(|d| d.is_finite() && *d > 0.0) {
        job = job.arg("-t").arg(format!("{d:.3}"));
    }
    job.run(out)?;
    Ok(out.to_path_buf())
}

/// Concat demuxer manifest body: one `file '<path>'` line per clip, in order.
pub fn concat_manifest_text(clips: &[PathBuf]) -> String {
    let mut text = String::new();
    for clip in clips {
        let p = clip.to_string_lossy().replace('\\', "/").replace('\'', r"'\''");
        text.push_str(&format!("file '{p}'\n"));
    }
    text
}

pub fn write_concat_manifest(clips: &[PathBuf], manifest: &Path) -> ReelResult<()> {
    if let Some(parent) = manifest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create manifest directory '{}'", parent.display()))?;
    }
    std::fs::write(manifest, concat_manifest_text(clips))
        .with_context(|| format!("write concat manifest '{}'", manifest.display()))?;
    Ok(())
}

/// Join the clips listed in `manifest` without re-encoding.
pub fn concat_segments(manifest: &Path, out: &Path, overwrite: bool) -> ReelResult<PathBuf> {
    FfmpegJob::new(overwrite)
        .args(["-f", "concat", "-safe", "0"])
        .input(manifest)
        .args(["-map", "0", "-c", "copy"])
        .run(out)?;
    Ok(out.to_path_buf())
}

/// Turn every renderable line into a segment under `<out_dir>/temp/` and concatenate them
/// into `<out_dir>/<filename>`. Returns the absolute output path.
///
/// Lines without a frame or audio, and lines whose encode fails, are skipped and reported.
/// Zero segments is an error.
#[tracing::instrument(skip(script, cfg, progress), fields(lines = script.len()))]
pub fn assemble_script(
    script: &Script,
    out_dir: &Path,
    filename: &str,
    cfg: &EncodeConfig,
    progress: &mut dyn FnMut(f64),
) -> ReelResult<Batch<PathBuf>> {
    let temp = out_dir.join("temp");
    std::fs::create_dir_all(&temp)
        .with_context(|| format!("create segment directory '{}'", temp.display()))?;
    let temp = std::path::absolute(&temp).with_context(|| format!("resolve '{}'", temp.display()))?;

    let total = script.len().max(1);
    let mut issues = Batch::new(());
    let mut segments = Vec::new();

    for (i, line) in script.iter().enumerate() {
        match (&line.image_path, &line.audio_path) {
            (Some(image), Some(audio)) => {
                let out = temp.join(format!("segment_{i}.mp4"));
                match build_segment(image, audio, line.duration_secs, &out, cfg) {
                    Ok(p) => segments.push(p),
                    Err(e) => {
                        error!(index = i, error = %e, "segment encode failed, skipping line");
                        issues.skip(i, "segment", e.to_string());
                    }
                }
            }
            (image, audio) => {
                warn!(
                    index = i,
                    has_image = image.is_some(),
                    has_audio = audio.is_some(),
                    "skipping line with missing assets"
                );
                issues.skip(i, "segment", "missing frame or audio");
            }
        }
        progress((i + 1) as f64 / total as f64);
    }

    if segments.is_empty() {
        error!(filename, "no segments created");
        return Err(ReelError::NoSegments(filename.to_string()));
    }

    let manifest = temp.join(MANIFEST_NAME);
    write_concat_manifest(&segments, &manifest)?;

    let out = std::path::absolute(out_dir.join(filename))
        .with_context(|| format!("resolve '{}'", out_dir.display()))?;
    info!(segments = segments.len(), out = %out.display(), "concatenating segments");
    concat_segments(&manifest, &out, cfg.overwrite)?;

    Ok(Batch {
        output: out,
        issues: issues.issues,
    })
}
