//! Vocabulary summary clip: one slide listing every word and one narrated audio track.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::{Rgba, RgbaImage, imageops};
use kurbo::{Point, RoundedRect, Shape as _};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    audio::AudioSynthesizer,
    config::{Config, parse_hex_color},
    encode_ffmpeg::{AUDIO_SAMPLE_RATE, FfmpegJob},
    error::{ReelError, ReelResult},
    frame::{
        TextRasterizer, TextStyle,
        layout::{CANVAS_HEIGHT, CANVAS_WIDTH},
    },
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VocabEntry {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub example: String,
}

pub fn load_vocab(path: &Path) -> ReelResult<Vec<VocabEntry>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read vocabulary '{}'", path.display()))?;
    serde_json::from_str(&text).map_err(|e| ReelError::serde(format!("vocabulary: {e}")))
}

/// Image and audio consumed as one extra clip at the end of the social video.
#[derive(Clone, Debug, PartialEq)]
pub struct VocabAssets {
    pub summary_image: PathBuf,
    pub summary_audio: PathBuf,
}

/// Produces the vocabulary clip assets. `Ok(None)` means the section is skipped.
pub trait VocabAssetFactory {
    fn build(&self, vocab: &[VocabEntry], out_dir: &Path) -> ReelResult<Option<VocabAssets>>;
}

pub const ROW_START_Y: u32 = 670;
pub const ROW_STEP_Y: u32 = 180;
/// x of the vertical spine badges and translations are aligned to.
pub const SPINE_X: i64 = 540;
pub const SPINE_GAP: i64 = 20;
pub const BADGE_PAD_X: u32 = 100;
pub const BADGE_PAD_Y: u32 = 50;
pub const BADGE_RADIUS: f64 = 40.0;
pub const BADGE_COLOR: &str = "#3B82F6";
pub const WORD_GAP_SECS: f64 = 0.3;

const WORD_FONT_PX: f32 = 100.0;
const TRANSLATION_FONT_PX: f32 = 70.0;

/// Badge rectangle for row `row` holding a word block of `text` size, right-aligned to the
/// spine.
pub fn badge_rect(row: usize, text: (u32, u32)) -> RoundedRect {
    let w = f64::from(text.0 + BADGE_PAD_X);
    let h = f64::from(text.1 + BADGE_PAD_Y);
    let right = (SPINE_X - SPINE_GAP) as f64;
    let top = f64::from(ROW_START_Y) + f64::from(ROW_STEP_Y) * row as f64;
    RoundedRect::new(right - w, top, right, top + h, BADGE_RADIUS)
}

/// ffmpeg filter graph appending `WORD_GAP_SECS` of silence to each of `n` inputs and joining
/// them in order.
pub fn silence_joined_filter(n: usize) -> String {
    let mut graph = String::new();
    for i in 0..n {
        graph.push_str(&format!("[{i}:a]apad=pad_dur={WORD_GAP_SECS}[a{i}];"));
    }
    for i in 0..n {
        graph.push_str(&format!("[a{i}]"));
    }
    graph.push_str(&format!("concat=n={n}:v=0:a=1[vocab]"));
    graph
}

/// Blue word badges on the left of the spine, translations on the right, every word read out
/// with a short pause after it.
pub struct SummarySlideFactory<'a> {
    config: &'a Config,
    synth: AudioSynthesizer<'a>,
    text: TextRasterizer,
}

impl<'a> SummarySlideFactory<'a> {
    pub fn new(config: &'a Config, synth: AudioSynthesizer<'a>, text: TextRasterizer) -> Self {
        Self {
            config,
            synth,
            text,
        }
    }

    pub fn render_slide(&self, vocab: &[VocabEntry]) -> ReelResult<Option<RgbaImage>> {
        let bg_path = self.config.asset_path(&self.config.settings.vocab_background);
        let mut slide = match image::open(&bg_path) {
            Ok(img) => img
                .resize_to_fill(CANVAS_WIDTH, CANVAS_HEIGHT, imageops::FilterType::Lanczos3)
                .into_rgba8(),
            Err(e) => {
                error!(background = %bg_path.display(), error = %e, "vocabulary background missing");
                return Ok(None);
            }
        };

        let badge_color = Rgba(parse_hex_color(BADGE_COLOR)?);
        let word_style = TextStyle::solid(WORD_FONT_PX, [255, 255, 255, 255]);
        let translation_style = TextStyle::solid(TRANSLATION_FONT_PX, [0, 0, 0, 255]);

        for (row, entry) in vocab.iter().enumerate() {
            let word = non_empty_or_unknown(&entry.word);
            let translation = non_empty_or_unknown(&entry.translation);

            let word_block = self.text.render_lines(&[word.to_string()], &word_style)?;
            let text_size = word_block
                .as_ref()
                .map(|b| b.dimensions())
                .unwrap_or((0, WORD_FONT_PX as u32));
            let badge = badge_rect(row, text_size);
            fill_rounded_rect(&mut slide, &badge, badge_color);

            let center = badge.rect().center();
            if let Some(block) = word_block {
                let x = (center.x - f64::from(block.width()) / 2.0).round() as i64;
                let y = (center.y - f64::from(block.height()) / 2.0).round() as i64;
                imageops::overlay(&mut slide, &block, x, y);
            }
            if let Some(block) = self
                .text
                .render_lines(&[translation.to_string()], &translation_style)?
            {
                let y = (center.y - f64::from(block.height()) / 2.0).round() as i64;
                imageops::overlay(&mut slide, &block, SPINE_X + SPINE_GAP, y);
            }
        }
        Ok(Some(slide))
    }

    fn narrate(&self, vocab: &[VocabEntry], out_dir: &Path) -> ReelResult<Option<PathBuf>> {
        let voice = self
            .config
            .settings
            .vocab_voice
            .as_ref()
            .or_else(|| self.config.narrator_voice());
        let Some(voice) = voice else {
            warn!("no vocabulary or narrator voice configured, skipping vocabulary audio");
            return Ok(None);
        };

        let ext = self.synth.engine().file_extension();
        let mut words = Vec::new();
        for (i, entry) in vocab.iter().enumerate() {
            let word = non_empty_or_unknown(&entry.word);
            let path = out_dir.join(format!("vocab_audio_{i}.{ext}"));
            match self.synth.synthesize_to(word, voice, &path) {
                Ok(_) => words.push(path),
                Err(e) => error!(word, error = %e, "vocabulary audio failed"),
            }
        }
        if words.is_empty() {
            return Ok(None);
        }

        let out = out_dir.join("vocab_full_mix.m4a");
        let mut job = FfmpegJob::new(true);
        for w in &words {
            job = job.input(w);
        }
        job.arg("-filter_complex")
            .arg(silence_joined_filter(words.len()))
            .args(["-map", "[vocab]", "-c:a", "aac", "-ar"])
            .arg(AUDIO_SAMPLE_RATE.to_string())
            .args(["-ac", "2"])
            .run(&out)?;
        Ok(Some(out))
    }
}

impl VocabAssetFactory for SummarySlideFactory<'_> {
    #[tracing::instrument(skip_all, fields(words = vocab.len()))]
    fn build(&self, vocab: &[VocabEntry], out_dir: &Path) -> ReelResult<Option<VocabAssets>> {
        if vocab.is_empty() {
            return Ok(None);
        }
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("create vocabulary directory '{}'", out_dir.display()))?;
        let out_dir = std::path::absolute(out_dir)
            .with_context(|| format!("resolve '{}'", out_dir.display()))?;

        let Some(slide) = self.render_slide(vocab)? else {
            return Ok(None);
        };
        let summary_image = out_dir.join("vocab_summary_slide.png");
        slide
            .save(&summary_image)
            .with_context(|| format!("write '{}'", summary_image.display()))?;

        let Some(summary_audio) = self.narrate(vocab, &out_dir)? else {
            warn!("vocabulary audio unavailable, skipping section");
            return Ok(None);
        };
        info!(slide = %summary_image.display(), "vocabulary assets ready");
        Ok(Some(VocabAssets {
            summary_image,
            summary_audio,
        }))
    }
}

fn non_empty_or_unknown(s: &str) -> &str {
    let t = s.trim();
    if t.is_empty() { "Unknown" } else { t }
}

/// Fill a rounded rectangle, sampling coverage at pixel centers.
fn fill_rounded_rect(img: &mut RgbaImage, rect: &RoundedRect, color: Rgba<u8>) {
    let bounds = rect.rect();
    let x0 = bounds.x0.floor().max(0.0) as u32;
    let y0 = bounds.y0.floor().max(0.0) as u32;
    let x1 = (bounds.x1.ceil().max(0.0) as u32).min(img.width());
    let y1 = (bounds.y1.ceil().max(0.0) as u32).min(img.height());
    for y in y0..y1 {
        for x in x0..x1 {
            if rect.contains(Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5)) {
                img.put_pixel(x, y, color);
            }
        }
    }
}
