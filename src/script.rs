use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::error::{ReelError, ReelResult};

/// Pseudo-speaker for descriptive text. Never part of the roster.
pub const NARRATOR: &str = "Narrator";

/// One dialogue line. Stages return copies with their output fields filled in.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptLine {
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
}

impl ScriptLine {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn is_narrator(&self) -> bool {
        self.speaker == NARRATOR
    }

    pub fn with_audio(mut self, path: PathBuf, duration_secs: f64) -> Self {
        self.audio_path = Some(path);
        self.duration_secs = Some(duration_secs);
        self
    }

    pub fn with_image(mut self, path: PathBuf) -> Self {
        self.image_path = Some(path);
        self
    }

    /// Both audio and frame exist, so the line can become a segment.
    pub fn is_renderable(&self) -> bool {
        self.audio_path.is_some() && self.image_path.is_some()
    }
}

/// Ordered dialogue script. Line order is playback order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script {
    lines: Vec<ScriptLine>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptDocument {
    Lines(Vec<ScriptLine>),
    Web { web_script: Vec<ScriptLine> },
}

impl Script {
    pub fn new(lines: Vec<ScriptLine>) -> Self {
        Self { lines }
    }

    /// Parse a script from JSON. Accepts a bare list of `{speaker, text}` records or the
    /// parser's `{"web_script": [...]}` wrapper, with or without a markdown code fence.
    pub fn from_json_str(text: &str) -> ReelResult<Self> {
        let body = strip_code_fence(text);
        let doc: ScriptDocument =
            serde_json::from_str(body).map_err(|e| ReelError::serde(format!("script: {e}")))?;
        let lines = match doc {
            ScriptDocument::Lines(lines) => lines,
            ScriptDocument::Web { web_script } => web_script,
        };
        Ok(Self { lines })
    }

    pub fn load(path: &Path) -> ReelResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read script '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    pub fn lines(&self) -> &[ScriptLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScriptLine> {
        self.lines.iter()
    }

    /// First `n` lines, for the short social teaser.
    pub fn social_cut(&self, n: usize) -> Self {
        Self {
            lines: self.lines.iter().take(n).cloned().collect(),
        }
    }

    /// Copy with every line's text replaced by `placeholder` (listening challenge).
    /// Audio and other fields are kept.
    pub fn masked(&self, placeholder: &str) -> Self {
        Self {
            lines: self
                .lines
                .iter()
                .map(|l| ScriptLine {
                    text: placeholder.to_string(),
                    image_path: None,
                    ..l.clone()
                })
                .collect(),
        }
    }

    pub fn renderable_count(&self) -> usize {
        self.lines.iter().filter(|l| l.is_renderable()).count()
    }

    /// Sum of known line durations.
    pub fn total_duration_secs(&self) -> f64 {
        self.lines.iter().filter_map(|l| l.duration_secs).sum()
    }
}

impl FromIterator<ScriptLine> for Script {
    fn from_iter<I: IntoIterator<Item = ScriptLine>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Script {
    type Item = ScriptLine;
    type IntoIter = std::vec::IntoIter<ScriptLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

impl<'a> IntoIterator for &'a Script {
    type Item = &'a ScriptLine;
    type IntoIter = std::slice::Iter<'a, ScriptLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

fn strip_code_fence(text: &str) -> &str {
    let t = text.trim();
    let t = t
        .strip_prefix("```json")
        .or_else(|| t.strip_prefix("```"))
        .unwrap_or(t);
    t.strip_suffix("```").unwrap_or(t).trim()
}
