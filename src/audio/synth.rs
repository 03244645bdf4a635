use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing::{error, info, warn};

use super::tts::SpeechEngine;
use crate::{
    assets::media::probe_duration_secs,
    config::{Config, VoiceParams},
    error::{Batch, ReelError, ReelResult},
    script::Script,
};

/// Per-line speech stage. Writes `audio_<index>.<ext>` files and measures their durations.
pub struct AudioSynthesizer<'a> {
    config: &'a Config,
    engine: &'a dyn SpeechEngine,
}

impl<'a> AudioSynthesizer<'a> {
    pub fn new(config: &'a Config, engine: &'a dyn SpeechEngine) -> Self {
        Self { config, engine }
    }

    pub fn engine(&self) -> &dyn SpeechEngine {
        self.engine
    }

    /// Synthesize one line. Returns the absolute audio path and its duration in seconds.
    ///
    /// The duration is 0.0 when the written file cannot be measured.
    #[tracing::instrument(skip(self, text, out_dir), fields(engine = self.engine.name()))]
    pub fn synthesize_line(
        &self,
        text: &str,
        speaker: &str,
        index: usize,
        out_dir: &Path,
    ) -> ReelResult<(PathBuf, f64)> {
        let Some(voice) = self.config.voice_for(speaker) else {
            error!(speaker, "no voice for speaker and no narrator voice configured");
            return Err(ReelError::config(format!(
                "no voice configured for '{speaker}' and no narrator voice to fall back to"
            )));
        };
        let path = out_dir.join(format!("audio_{index}.{}", self.engine.file_extension()));
        let duration = self.synthesize_to(text, voice, &path)?;
        let path = std::path::absolute(&path)
            .with_context(|| format!("resolve '{}'", path.display()))?;
        Ok((path, duration))
    }

    /// Synthesize `text` with an explicit voice into `path`.
    pub fn synthesize_to(&self, text: &str, voice: &VoiceParams, path: &Path) -> ReelResult<f64> {
        let bytes = self.engine.synthesize(text, voice)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create audio directory '{}'", parent.display()))?;
        }
        std::fs::write(path, &bytes)
            .with_context(|| format!("write audio '{}'", path.display()))?;
        Ok(measure_duration(path))
    }

    /// Synthesize every line with a speaker and text, in order. Lines that fail are reported
    /// and passed through without audio.
    #[tracing::instrument(skip_all, fields(lines = script.len(), out = %out_dir.display()))]
    pub fn synthesize_script(
        &self,
        script: &Script,
        out_dir: &Path,
        progress: &mut dyn FnMut(f64),
    ) -> ReelResult<Batch<Script>> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("create audio directory '{}'", out_dir.display()))?;

        let total = script.len().max(1);
        let mut lines = Vec::with_capacity(script.len());
        let mut batch = Batch::new(Script::default());

        for (i, line) in script.iter().enumerate() {
            if line.speaker.is_empty() || line.text.trim().is_empty() {
                lines.push(line.clone());
            } else {
                match self.synthesize_line(&line.text, &line.speaker, i, out_dir) {
                    Ok((path, duration)) => lines.push(line.clone().with_audio(path, duration)),
                    Err(e) => {
                        error!(index = i, speaker = %line.speaker, error = %e, "speech synthesis failed");
                        batch.skip(i, "audio", e.to_string());
                        lines.push(line.clone());
                    }
                }
            }
            progress((i + 1) as f64 / total as f64);
        }

        info!(
            synthesized = lines.iter().filter(|l| l.audio_path.is_some()).count(),
            failed = batch.issues.len(),
            "audio synthesized"
        );
        batch.output = Script::new(lines);
        Ok(batch)
    }
}

fn measure_duration(path: &Path) -> f64 {
    match probe_duration_secs(path) {
        Ok(d) => d,
        Err(e) => {
            warn!(audio = %path.display(), error = %e, "could not determine audio duration");
            0.0
        }
    }
}
