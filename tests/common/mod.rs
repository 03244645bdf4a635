#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use storyreel::{Config, ReelResult, SpeechEngine, VoiceParams};

pub fn temp_dir(tag: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "storyreel_{tag}_{}_{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn write_png(path: &Path, w: u32, h: u32, rgba: [u8; 4]) {
    RgbaImage::from_pixel(w, h, Rgba(rgba)).save(path).unwrap();
}

/// Mono 16-bit PCM WAV of silence.
pub fn silent_wav(secs: f64) -> Vec<u8> {
    const RATE: u32 = 44_100;
    let samples = (secs * f64::from(RATE)).round() as u32;
    let data_len = samples * 2;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&RATE.to_le_bytes());
    out.extend_from_slice(&(RATE * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(44 + data_len as usize, 0);
    out
}

/// Speech engine that writes silence, 0.5 s plus 0.1 s per word.
pub struct FakeTts;

impl FakeTts {
    pub fn seconds_for(text: &str) -> f64 {
        0.5 + 0.1 * text.split_whitespace().count() as f64
    }
}

impl SpeechEngine for FakeTts {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn file_extension(&self) -> &'static str {
        "wav"
    }

    fn synthesize(&self, text: &str, _voice: &VoiceParams) -> ReelResult<Vec<u8>> {
        Ok(silent_wav(Self::seconds_for(text)))
    }
}

/// Config with Herbert and Margot plus a balloon and sprites written into `dir`.
pub fn fixture_config(dir: &Path) -> Config {
    write_png(&dir.join("balloon.png"), 1000, 500, [230, 230, 255, 255]);
    write_png(&dir.join("herbert.png"), 400, 800, [255, 0, 0, 255]);
    write_png(&dir.join("margot.png"), 400, 800, [0, 0, 255, 255]);
    let mut cfg = Config::from_json_str(
        r#"{
            "characters": {
                "Herbert": {"image": "herbert.png", "voice_params": {"name": "en-GB-Neural2-B"}},
                "Margot": {"image": "margot.png"}
            },
            "narrator": {"voice_params": {"name": "en-US-Neural2-F", "ssml_gender": "FEMALE"}},
            "settings": {
                "balloon_image": "balloon.png",
                "font_path": "font.ttf",
                "intro_video": "intro.mp4",
                "logo_image": "logo.png",
                "music_dir": "music",
                "lesson_background": "lesson.png",
                "vocab_background": "vocabulary.png"
            }
        }"#,
    )
    .unwrap();
    cfg.base_dir = dir.to_path_buf();
    cfg
}
