//! Full-screen cards drawn outside the dialogue passes: the separator between listening and
//! reading, the web title card and the transparent title overlay.

use std::path::Path;

use image::{DynamicImage, Rgba, RgbaImage, imageops};
use kurbo::Point;
use tracing::warn;

use super::{
    layout::center_origin,
    text::{TextRasterizer, TextStyle, wrap_text},
};
use crate::error::ReelResult;

pub const SEPARATOR_FONT_PX: f32 = 80.0;
pub const TITLE_CARD_FONT_PX: f32 = 100.0;
pub const TITLE_OVERLAY_FONT_PX: f32 = 90.0;
/// Top edge of the title overlay text block.
pub const TITLE_OVERLAY_TOP: i64 = 1100;

const WHITE: [u8; 4] = [255, 255, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];
const TITLE_GREY: [u8; 4] = [0x33, 0x33, 0x33, 255];

/// Wrap width for title cards: 80% of the canvas at half an em per character, never below 10.
pub fn title_card_columns(width: u32) -> usize {
    let usable = f64::from(width) * 0.8;
    ((usable / (0.5 * f64::from(TITLE_CARD_FONT_PX))) as usize).max(10)
}

/// Wrap width for the title overlay: 90% of the canvas at half an em per character.
pub fn title_overlay_columns(width: u32) -> usize {
    let usable = f64::from(width) * 0.9;
    ((usable / (0.5 * f64::from(TITLE_OVERLAY_FONT_PX))) as usize).max(1)
}

pub fn render_separator(
    text: &TextRasterizer,
    caption: &str,
    width: u32,
    height: u32,
) -> ReelResult<RgbaImage> {
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba(BLACK));
    let lines = wrap_text(caption, super::layout::WRAP_COLUMNS);
    if let Some(block) = text.render_lines(&lines, &TextStyle::solid(SEPARATOR_FONT_PX, WHITE))? {
        let (x, y) = center_origin(canvas_center(width, height), block.dimensions());
        imageops::overlay(&mut canvas, &block, x, y);
    }
    Ok(canvas)
}

/// Lesson title over the cover-fitted background, or over white when it is unavailable.
pub fn render_title_card(
    text: &TextRasterizer,
    title: &str,
    background: Option<&Path>,
    width: u32,
    height: u32,
) -> ReelResult<RgbaImage> {
    let mut canvas = background
        .and_then(|p| match image::open(p) {
            Ok(img) => Some(cover_fit(img, width, height)),
            Err(e) => {
                warn!(background = %p.display(), error = %e, "title background unavailable");
                None
            }
        })
        .unwrap_or_else(|| RgbaImage::from_pixel(width, height, Rgba(WHITE)));

    let lines = wrap_text(title, title_card_columns(width));
    if let Some(block) = text.render_lines(&lines, &TextStyle::solid(TITLE_CARD_FONT_PX, TITLE_GREY))? {
        let (x, y) = center_origin(canvas_center(width, height), block.dimensions());
        imageops::overlay(&mut canvas, &block, x, y);
    }
    Ok(canvas)
}

/// Transparent overlay with the outlined title, horizontally centered below the middle.
pub fn render_title_overlay(
    text: &TextRasterizer,
    title: &str,
    width: u32,
    height: u32,
) -> ReelResult<RgbaImage> {
    let mut canvas = RgbaImage::new(width, height);
    let lines = wrap_text(title, title_overlay_columns(width));
    let style = TextStyle::solid(TITLE_OVERLAY_FONT_PX, WHITE).with_stroke(BLACK, 6.0);
    if let Some(block) = text.render_lines(&lines, &style)? {
        let x = (i64::from(width) - i64::from(block.width())) / 2;
        imageops::overlay(&mut canvas, &block, x, TITLE_OVERLAY_TOP);
    }
    Ok(canvas)
}

fn cover_fit(img: DynamicImage, width: u32, height: u32) -> RgbaImage {
    img.resize_to_fill(width, height, imageops::FilterType::Lanczos3)
        .into_rgba8()
}

fn canvas_center(width: u32, height: u32) -> Point {
    Point::new(f64::from(width) / 2.0, f64::from(height) / 2.0)
}
