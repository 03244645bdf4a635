use std::path::Path;

use anyhow::Context as _;
use image::{RgbaImage, imageops::FilterType};

use crate::error::ReelResult;

pub fn load_rgba(path: &Path) -> ReelResult<RgbaImage> {
    let img = image::open(path).with_context(|| format!("decode image '{}'", path.display()))?;
    Ok(img.into_rgba8())
}

/// Target size for scaling `(w, h)` to `target_w`, aspect preserved.
pub fn fit_width(w: u32, h: u32, target_w: u32) -> (u32, u32) {
    if w == 0 {
        return (target_w, 0);
    }
    let ratio = f64::from(target_w) / f64::from(w);
    (target_w, ((f64::from(h) * ratio) as u32).max(1))
}

/// Target size for scaling `(w, h)` to `target_h`, aspect preserved.
pub fn fit_height(w: u32, h: u32, target_h: u32) -> (u32, u32) {
    if h == 0 {
        return (0, target_h);
    }
    let ratio = f64::from(target_h) / f64::from(h);
    (((f64::from(w) * ratio) as u32).max(1), target_h)
}

pub fn resize(img: &RgbaImage, w: u32, h: u32) -> RgbaImage {
    if img.dimensions() == (w, h) {
        return img.clone();
    }
    image::imageops::resize(img, w, h, FilterType::Lanczos3)
}

/// Copy of `img` with every alpha value multiplied by `factor`.
pub fn with_opacity(img: &RgbaImage, factor: f32) -> RgbaImage {
    let mut out = img.clone();
    if factor >= 1.0 {
        return out;
    }
    let factor = factor.max(0.0);
    for px in out.pixels_mut() {
        px.0[3] = (f32::from(px.0[3]) * factor) as u8;
    }
    out
}

/// Convert a premultiplied tiny-skia pixmap into a straight-alpha image.
pub fn pixmap_to_rgba(pixmap: &resvg::tiny_skia::Pixmap) -> RgbaImage {
    let mut out = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        dst.0 = [c.red(), c.green(), c.blue(), c.alpha()];
    }
    out
}
