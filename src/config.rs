use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ReelError, ReelResult},
    roster::resolve_character_key,
    script::NARRATOR,
};

/// Static run configuration. Loaded once and shared by reference with every stage.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub characters: BTreeMap<String, CharacterConfig>,
    #[serde(default)]
    pub narrator: NarratorConfig,
    #[serde(default)]
    pub settings: Settings,
    /// Directory relative asset paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterConfig {
    pub image: PathBuf,
    #[serde(default)]
    pub voice_params: Option<VoiceParams>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NarratorConfig {
    #[serde(default)]
    pub voice_params: Option<VoiceParams>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    #[serde(default = "default_language_code")]
    pub language_code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ssml_gender: SsmlGender,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SsmlGender {
    #[default]
    Male,
    Female,
    Neutral,
}

impl SsmlGender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "MALE",
            Self::Female => "FEMALE",
            Self::Neutral => "NEUTRAL",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub background_color: String,
    pub font_path: PathBuf,
    pub font_size: f32,
    pub balloon_image: PathBuf,
    pub video_codec: String,
    /// Extra `-preset` value, needed by some hardware encoders.
    pub codec_preset: Option<String>,
    pub audio_codec: String,
    pub fps: u32,
    pub enable_vocab_section: bool,
    pub enable_music: bool,
    pub social_line_count: usize,
    pub listening_placeholder: String,
    pub separator_text: String,
    pub intro_video: PathBuf,
    pub logo_image: PathBuf,
    pub music_dir: PathBuf,
    pub lesson_background: PathBuf,
    pub vocab_background: PathBuf,
    /// Voice used for vocabulary pronunciations; falls back to the narrator voice.
    pub vocab_voice: Option<VoiceParams>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            background_color: "#FFFFFF".to_string(),
            font_path: PathBuf::from("assets/font.ttf"),
            font_size: 50.0,
            balloon_image: PathBuf::from("assets/balloon.png"),
            video_codec: "libx264".to_string(),
            codec_preset: None,
            audio_codec: "aac".to_string(),
            fps: 30,
            enable_vocab_section: true,
            enable_music: false,
            social_line_count: 6,
            listening_placeholder: "..... ? .....".to_string(),
            separator_text: "Check your understanding...".to_string(),
            intro_video: PathBuf::from("assets/intro.mp4"),
            logo_image: PathBuf::from("assets/NoBackground.png"),
            music_dir: PathBuf::from("assets"),
            lesson_background: PathBuf::from("assets/lesson.png"),
            vocab_background: PathBuf::from("assets/vocabulary.png"),
            vocab_voice: None,
        }
    }
}

fn default_language_code() -> String {
    "en-US".to_string()
}

impl Config {
    pub fn load(path: &Path) -> ReelResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let mut cfg = Self::from_json_str(&text)?;
        cfg.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(cfg)
    }

    pub fn from_json_str(text: &str) -> ReelResult<Self> {
        let mut cfg: Self =
            serde_json::from_str(text).map_err(|e| ReelError::serde(format!("config: {e}")))?;
        cfg.base_dir = PathBuf::from(".");
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ReelResult<()> {
        let s = &self.settings;
        if !s.font_size.is_finite() || s.font_size <= 0.0 {
            return Err(ReelError::config("settings.font_size must be positive"));
        }
        if s.fps == 0 {
            return Err(ReelError::config("settings.fps must be non-zero"));
        }
        if s.video_codec.trim().is_empty() {
            return Err(ReelError::config("settings.video_codec must be non-empty"));
        }
        parse_hex_color(&s.background_color)?;
        for key in self.characters.keys() {
            if key.trim().is_empty() || key == NARRATOR {
                return Err(ReelError::config(format!(
                    "invalid character key '{key}' (empty or reserved)"
                )));
            }
        }
        Ok(())
    }

    pub fn character_keys(&self) -> impl Iterator<Item = &str> + Clone {
        self.characters.keys().map(String::as_str)
    }

    pub fn narrator_voice(&self) -> Option<&VoiceParams> {
        self.narrator.voice_params.as_ref()
    }

    /// Voice selection: narrator voice for the narrator, otherwise the resolved character's
    /// voice, falling back to the narrator voice when the character has none.
    pub fn voice_for(&self, speaker: &str) -> Option<&VoiceParams> {
        if speaker == NARRATOR {
            return self.narrator_voice();
        }
        resolve_character_key(speaker, self.character_keys())
            .and_then(|key| self.characters.get(key))
            .and_then(|c| c.voice_params.as_ref())
            .or_else(|| self.narrator_voice())
    }

    /// Resolve a configured path against the config file's directory.
    pub fn asset_path(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    pub fn background_rgba(&self) -> ReelResult<[u8; 4]> {
        parse_hex_color(&self.settings.background_color)
    }
}

/// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA`.
pub fn parse_hex_color(s: &str) -> ReelResult<[u8; 4]> {
    let hex = s.trim().trim_start_matches('#');
    let bad = || ReelError::config(format!("invalid hex color '{s}'"));
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(bad());
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
    match hex.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16).ok_or_else(bad)? as u8;
                out[i] = v * 17;
            }
            Ok(out)
        }
        6 => Ok([byte(0)?, byte(2)?, byte(4)?, 255]),
        8 => Ok([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "characters": {
            "Herbert": {
                "image": "assets/herbert.png",
                "voice_params": {"language_code": "en-GB", "name": "en-GB-Neural2-B", "ssml_gender": "MALE"}
            },
            "Margot": {"image": "assets/margot.png"}
        },
        "narrator": {"voice_params": {"name": "en-US-Neural2-F", "ssml_gender": "FEMALE"}},
        "settings": {"font_size": 56, "background_color": "#F0F0F0", "enable_music": true}
    }"##;

    #[test]
    fn parses_sample_with_defaults() {
        let cfg = Config::from_json_str(SAMPLE).unwrap();
        assert_eq!(cfg.characters.len(), 2);
        assert_eq!(cfg.settings.font_size, 56.0);
        assert!(cfg.settings.enable_music);
        assert_eq!(cfg.settings.video_codec, "libx264");
        assert_eq!(cfg.settings.social_line_count, 6);
        let narrator = cfg.narrator_voice().unwrap();
        assert_eq!(narrator.language_code, "en-US");
        assert_eq!(narrator.ssml_gender, SsmlGender::Female);
    }

    #[test]
    fn voice_policy_falls_back_to_narrator() {
        let cfg = Config::from_json_str(SAMPLE).unwrap();
        let narrator = cfg.narrator_voice().cloned();
        assert_eq!(
            cfg.voice_for("Herbert Walker").and_then(|v| v.name.clone()),
            Some("en-GB-Neural2-B".to_string())
        );
        assert_eq!(cfg.voice_for("Margot").cloned(), narrator);
        assert_eq!(cfg.voice_for("Stranger").cloned(), narrator);
        assert_eq!(cfg.voice_for(NARRATOR).cloned(), narrator);
    }

    #[test]
    fn no_voice_anywhere_yields_none() {
        let cfg = Config::from_json_str(r#"{"characters": {"A": {"image": "a.png"}}}"#).unwrap();
        assert!(cfg.voice_for("A").is_none());
        assert!(cfg.voice_for(NARRATOR).is_none());
    }

    #[test]
    fn validation_rejects_bad_values() {
        assert!(Config::from_json_str(r#"{"settings": {"font_size": 0}}"#).is_err());
        assert!(Config::from_json_str(r#"{"settings": {"fps": 0}}"#).is_err());
        assert!(Config::from_json_str(r#"{"settings": {"background_color": "nope"}}"#).is_err());
        assert!(
            Config::from_json_str(r#"{"characters": {"Narrator": {"image": "n.png"}}}"#).is_err()
        );
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex_color("#FFFFFF").unwrap(), [255, 255, 255, 255]);
        assert_eq!(parse_hex_color("#000").unwrap(), [0, 0, 0, 255]);
        assert_eq!(parse_hex_color("3B82F680").unwrap(), [0x3b, 0x82, 0xf6, 0x80]);
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#GGGGGG").is_err());
    }

    #[test]
    fn relative_asset_paths_use_base_dir() {
        let mut cfg = Config::default();
        cfg.base_dir = PathBuf::from("/srv/lesson");
        assert_eq!(
            cfg.asset_path(Path::new("assets/balloon.png")),
            PathBuf::from("/srv/lesson/assets/balloon.png")
        );
        assert_eq!(cfg.asset_path(Path::new("/abs.png")), PathBuf::from("/abs.png"));
    }
}
