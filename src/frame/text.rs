use std::{fmt::Write as _, path::Path, sync::Arc};

use anyhow::Context as _;
use image::RgbaImage;
use tracing::{debug, warn};

use crate::{assets::decode::pixmap_to_rgba, error::ReelResult};

/// Transparent margin around a rasterized text block, equal on every side.
const BLOCK_PAD: u32 = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct TextStyle {
    pub size_px: f32,
    pub fill: [u8; 4],
    /// Outline color and width in pixels.
    pub stroke: Option<([u8; 4], f32)>,
    pub line_height: f32,
}

impl TextStyle {
    pub fn solid(size_px: f32, fill: [u8; 4]) -> Self {
        Self {
            size_px,
            fill,
            stroke: None,
            line_height: 1.2,
        }
    }

    pub fn with_stroke(mut self, color: [u8; 4], width: f32) -> Self {
        self.stroke = Some((color, width));
        self
    }
}

/// Rasterizes centered multi-line text blocks through usvg/resvg.
///
/// The configured font file is loaded next to the system fonts. When it cannot be loaded the
/// rasterizer falls back to the default sans-serif face.
#[derive(Clone)]
pub struct TextRasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
    family: String,
}

impl TextRasterizer {
    pub fn new(font_path: &Path) -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();

        let known: Vec<usvg::fontdb::ID> = db.faces().map(|f| f.id).collect();
        let family = match db.load_font_file(font_path) {
            Ok(()) => db
                .faces()
                .find(|f| !known.contains(&f.id))
                .and_then(|f| f.families.first().map(|(name, _)| name.clone())),
            Err(e) => {
                warn!(
                    font = %font_path.display(),
                    error = %e,
                    "could not load font, using default sans-serif"
                );
                None
            }
        };
        if db.is_empty() {
            warn!("no fonts available, text will not be drawn");
        }

        Self {
            fontdb: Arc::new(db),
            family: family.unwrap_or_else(|| "sans-serif".to_string()),
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// Rasterize `lines`, each centered on a common axis, cropped to the ink bounding box
    /// plus a fixed symmetric pad. Returns `None` when nothing would be drawn.
    pub fn render_lines(&self, lines: &[String], style: &TextStyle) -> ReelResult<Option<RgbaImage>> {
        if lines.iter().all(|l| l.trim().is_empty()) {
            return Ok(None);
        }

        let svg = self.block_svg(lines, style);
        let opts = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            font_family: self.family.clone(),
            font_resolver: fallback_font_resolver(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&svg, &opts).context("parse text svg")?;

        let bbox = tree.root().abs_stroke_bounding_box();
        if !tree.root().has_children() || !(bbox.width() > 0.0 && bbox.height() > 0.0) {
            debug!(lines = lines.len(), "text produced no glyphs");
            return Ok(None);
        }

        let w = bbox.width().ceil() as u32 + 2 * BLOCK_PAD;
        let h = bbox.height().ceil() as u32 + 2 * BLOCK_PAD;
        let mut pixmap = resvg::tiny_skia::Pixmap::new(w, h)
            .context("allocate text pixmap")?;
        let xform = resvg::tiny_skia::Transform::from_translate(
            BLOCK_PAD as f32 - bbox.left(),
            BLOCK_PAD as f32 - bbox.top(),
        );
        resvg::render(&tree, xform, &mut pixmap.as_mut());
        Ok(Some(pixmap_to_rgba(&pixmap)))
    }

    fn block_svg(&self, lines: &[String], style: &TextStyle) -> String {
        let size = style.size_px;
        let line_h = size * style.line_height;
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let width = (longest as f32 + 2.0) * size;
        let height = line_h * lines.len() as f32 + 2.0 * size;
        let cx = width / 2.0;

        let [r, g, b, a] = style.fill;
        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
        );
        let _ = write!(
            svg,
            r#"<text font-family="{}" font-size="{size}" text-anchor="middle" fill="rgb({r},{g},{b})" fill-opacity="{}""#,
            font_family_attr(&self.family),
            f32::from(a) / 255.0
        );
        if let Some(([sr, sg, sb, sa], sw)) = style.stroke {
            let _ = write!(
                svg,
                r#" stroke="rgb({sr},{sg},{sb})" stroke-opacity="{}" stroke-width="{sw}" stroke-linejoin="round" paint-order="stroke""#,
                f32::from(sa) / 255.0
            );
        }
        svg.push('>');
        for (i, line) in lines.iter().enumerate() {
            let y = size + line_h * i as f32;
            let _ = write!(
                svg,
                r#"<tspan x="{cx}" y="{y}">{}</tspan>"#,
                escape_xml(line)
            );
        }
        svg.push_str("</text></svg>");
        svg
    }
}

/// Resolve the requested family, then the generic families, then any face at all.
fn fallback_font_resolver() -> usvg::FontResolver<'static> {
    use usvg::fontdb::{Family, Query, Stretch, Style, Weight};

    usvg::FontResolver {
        select_font: Box::new(|font, fontdb| {
            let mut families: Vec<Family<'_>> = font
                .families()
                .iter()
                .map(|f| match f {
                    usvg::FontFamily::Serif => Family::Serif,
                    usvg::FontFamily::SansSerif => Family::SansSerif,
                    usvg::FontFamily::Cursive => Family::Cursive,
                    usvg::FontFamily::Fantasy => Family::Fantasy,
                    usvg::FontFamily::Monospace => Family::Monospace,
                    usvg::FontFamily::Named(s) => Family::Name(s),
                })
                .collect();
            families.extend([Family::SansSerif, Family::Serif]);

            let style = match font.style() {
                usvg::FontStyle::Normal => Style::Normal,
                usvg::FontStyle::Italic => Style::Italic,
                usvg::FontStyle::Oblique => Style::Oblique,
            };
            let query = Query {
                families: &families,
                weight: Weight(font.weight()),
                stretch: Stretch::Normal,
                style,
            };
            fontdb
                .query(&query)
                .or_else(|| fontdb.faces().next().map(|f| f.id))
        }),
        select_fallback: usvg::FontResolver::default_fallback_selector(),
    }
}

fn font_family_attr(family: &str) -> String {
    let clean: String = family.chars().filter(|c| !matches!(c, '\'' | '"')).collect();
    match clean.as_str() {
        "serif" | "sans-serif" | "monospace" | "cursive" | "fantasy" => clean,
        _ => escape_xml(&format!("'{clean}', sans-serif")),
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Greedy word wrap to at most `columns` characters per line. Whitespace runs collapse and
/// words longer than a line are split.
pub fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut rest = word;
        while !rest.is_empty() {
            let len = rest.chars().count();
            let needed = if current_len == 0 { len } else { current_len + 1 + len };
            if needed <= columns {
                if current_len > 0 {
                    current.push(' ');
                    current_len += 1;
                }
                current.push_str(rest);
                current_len += len;
                break;
            }
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }
            let split = rest
                .char_indices()
                .nth(columns)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            lines.push(rest[..split].to_string());
            rest = &rest[split..];
        }
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}
