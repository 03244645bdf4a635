use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::{Rgba, RgbaImage, imageops};
use tracing::{info, warn};

use super::{
    layout::{
        CANVAS_HEIGHT, CANVAS_WIDTH, CHARACTER_HEIGHT, SpritePlacement, StageLayout, WRAP_COLUMNS,
        plan_stage,
    },
    text::{TextRasterizer, TextStyle, wrap_text},
};
use crate::{
    assets::decode::{load_rgba, resize, with_opacity},
    config::Config,
    error::{Batch, ReelError, ReelResult},
    roster::{Roster, resolve_character_key},
    script::{Script, ScriptLine},
};

const TEXT_COLOR: [u8; 4] = [0, 0, 0, 255];

/// One roster member's sprite, pre-scaled for its slot in both opacities.
struct CastSprite {
    full: RgbaImage,
    dimmed: RgbaImage,
}

/// Draws visual-novel frames for one script pass.
///
/// Assets are loaded and scaled once in [`FrameRenderer::prepare`]; layout and slot mapping
/// stay fixed for every line rendered afterwards.
pub struct FrameRenderer<'c> {
    config: &'c Config,
    roster: Roster,
    layout: StageLayout,
    background: Rgba<u8>,
    balloon: RgbaImage,
    cast: Vec<Option<CastSprite>>,
    text: TextRasterizer,
    text_style: TextStyle,
}

impl<'c> FrameRenderer<'c> {
    pub fn prepare(config: &'c Config, roster: Roster) -> ReelResult<Self> {
        let text = TextRasterizer::new(&config.asset_path(&config.settings.font_path));
        Self::with_text(config, roster, text)
    }

    /// Like [`FrameRenderer::prepare`] but reusing an already loaded font database.
    pub fn with_text(config: &'c Config, roster: Roster, text: TextRasterizer) -> ReelResult<Self> {
        let background = Rgba(config.background_rgba()?);

        let balloon_path = config.asset_path(&config.settings.balloon_image);
        let balloon_src = load_rgba(&balloon_path).map_err(|e| {
            ReelError::asset(format!(
                "balloon image '{}' could not be loaded: {e}",
                balloon_path.display()
            ))
        })?;
        let (bw, bh) = StageLayout::balloon_size_for(CANVAS_WIDTH, balloon_src.dimensions());
        let balloon = resize(&balloon_src, bw, bh);
        let layout = StageLayout::new(CANVAS_WIDTH, CANVAS_HEIGHT, (bw, bh), CHARACTER_HEIGHT);

        let cast = roster
            .members()
            .iter()
            .map(|key| load_cast_sprite(config, &layout, roster.len(), key))
            .collect();

        Ok(Self {
            config,
            roster,
            layout,
            background,
            balloon,
            cast,
            text,
            text_style: TextStyle::solid(config.settings.font_size, TEXT_COLOR),
        })
    }

    pub fn layout(&self) -> &StageLayout {
        &self.layout
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Character placements for one line, in slot order.
    pub fn plan(&self, line: &ScriptLine) -> Vec<SpritePlacement> {
        let sizes: Vec<Option<(u32, u32)>> = self
            .cast
            .iter()
            .map(|c| c.as_ref().map(|s| s.full.dimensions()))
            .collect();
        let speaking = self.speaking_key(&line.speaker);
        plan_stage(&self.layout, &self.roster, &sizes, &line.speaker, speaking)
    }

    fn speaking_key(&self, speaker: &str) -> Option<&str> {
        resolve_character_key(speaker, self.config.character_keys())
            .filter(|key| self.roster.contains(key))
    }

    pub fn render_line(&self, line: &ScriptLine) -> ReelResult<RgbaImage> {
        let mut canvas =
            RgbaImage::from_pixel(self.layout.canvas_width, self.layout.canvas_height, self.background);

        for p in self.plan(line) {
            let Some(sprite) = self.cast.get(p.slot).and_then(Option::as_ref) else {
                continue;
            };
            let img = if p.opacity >= 1.0 {
                &sprite.full
            } else {
                &sprite.dimmed
            };
            imageops::overlay(&mut canvas, img, p.x, p.y);
        }

        let (bx, by) = self.layout.balloon_origin();
        imageops::overlay(&mut canvas, &self.balloon, bx, by);

        let lines = wrap_text(&line.text, WRAP_COLUMNS);
        if let Some(block) = self.text.render_lines(&lines, &self.text_style)? {
            let (tx, ty) = self.layout.text_origin(block.dimensions());
            imageops::overlay(&mut canvas, &block, tx, ty);
        }
        Ok(canvas)
    }

    /// Render `frame_<i>.png` for every line into `out_dir` and return the script with
    /// `image_path` set. Lines that fail to render are reported and left without a frame.
    #[tracing::instrument(skip_all, fields(lines = script.len(), out = %out_dir.display()))]
    pub fn render_script(
        &self,
        script: &Script,
        out_dir: &Path,
        progress: &mut dyn FnMut(f64),
    ) -> ReelResult<Batch<Script>> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("create frame directory '{}'", out_dir.display()))?;
        let out_dir = std::path::absolute(out_dir)
            .with_context(|| format!("resolve '{}'", out_dir.display()))?;

        let total = script.len().max(1);
        let mut lines = Vec::with_capacity(script.len());
        let mut batch = Batch::new(Script::default());

        for (i, line) in script.iter().enumerate() {
            let path = out_dir.join(format!("frame_{i}.png"));
            match self.render_to(line, &path) {
                Ok(()) => lines.push(line.clone().with_image(path)),
                Err(e) => {
                    warn!(index = i, error = %e, "frame render failed, skipping line");
                    batch.skip(i, "frame", e.to_string());
                    lines.push(line.clone());
                }
            }
            progress((i + 1) as f64 / total as f64);
        }

        info!(
            rendered = lines.iter().filter(|l| l.image_path.is_some()).count(),
            skipped = batch.issues.len(),
            "frames rendered"
        );
        batch.output = Script::new(lines);
        Ok(batch)
    }

    fn render_to(&self, line: &ScriptLine, path: &Path) -> ReelResult<()> {
        let frame = self.render_line(line)?;
        frame
            .save(path)
            .with_context(|| format!("write frame '{}'", path.display()))?;
        Ok(())
    }
}

fn load_cast_sprite(
    config: &Config,
    layout: &StageLayout,
    count: usize,
    key: &str,
) -> Option<CastSprite> {
    let Some(character) = config.characters.get(key) else {
        warn!(character = key, "roster member has no configuration, leaving its slot empty");
        return None;
    };
    let path: PathBuf = config.asset_path(&character.image);
    let src = match load_rgba(&path) {
        Ok(img) => img,
        Err(e) => {
            warn!(
                character = key,
                image = %path.display(),
                error = %e,
                "character image unavailable, leaving its slot empty"
            );
            return None;
        }
    };
    let normalized = layout.normalized_sprite_size(src.dimensions());
    let (w, h) = layout.fit_to_slot(count, normalized);
    let full = resize(&src, w, h);
    let dimmed = with_opacity(&full, super::layout::DIMMED_OPACITY);
    Some(CastSprite { full, dimmed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::NARRATOR;

    fn temp_dir(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "storyreel_frame_{tag}_{}_{nanos}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn fixture(dir: &Path, with_balloon: bool) -> Config {
        if with_balloon {
            RgbaImage::from_pixel(1000, 500, Rgba([200, 200, 255, 255]))
                .save(dir.join("balloon.png"))
                .unwrap();
        }
        RgbaImage::from_pixel(400, 800, Rgba([255, 0, 0, 255]))
            .save(dir.join("a.png"))
            .unwrap();
        let mut cfg = Config::from_json_str(
            r#"{
                "characters": {
                    "A": {"image": "a.png"},
                    "B": {"image": "a.png"},
                    "C": {"image": "missing.png"}
                },
                "settings": {"balloon_image": "balloon.png", "font_path": "nofont.ttf"}
            }"#,
        )
        .unwrap();
        cfg.base_dir = dir.to_path_buf();
        cfg
    }

    fn text() -> TextRasterizer {
        TextRasterizer::new(Path::new("/nonexistent/font.ttf"))
    }

    #[test]
    fn missing_balloon_is_fatal() {
        let dir = temp_dir("noballoon");
        let cfg = fixture(&dir, false);
        let roster = Roster::from_members(vec!["A".into()]);
        let err = FrameRenderer::with_text(&cfg, roster, text()).err().unwrap();
        assert!(matches!(err, ReelError::Asset(_)), "{err}");
    }

    #[test]
    fn speaker_is_opaque_and_others_dimmed() {
        let dir = temp_dir("opacity");
        let cfg = fixture(&dir, true);
        let roster = Roster::from_members(vec!["A".into(), "B".into()]);
        let r = FrameRenderer::with_text(&cfg, roster, text()).unwrap();

        let frame = r.render_line(&ScriptLine::new("A", "Hi")).unwrap();
        assert_eq!(frame.dimensions(), (1080, 1920));
        let a = frame.get_pixel(270, 1228).0;
        let b = frame.get_pixel(810, 1228).0;
        assert_eq!(&a[..3], &[255, 0, 0]);
        assert!((100..=160).contains(&b[1]), "{b:?}");

        let narrated = r.render_line(&ScriptLine::new(NARRATOR, "Later.")).unwrap();
        let a = narrated.get_pixel(270, 1228).0;
        assert!((100..=160).contains(&a[1]), "{a:?}");
    }

    #[test]
    fn unloadable_sprite_keeps_its_slot() {
        let dir = temp_dir("slots");
        let cfg = fixture(&dir, true);
        let roster = Roster::from_members(vec!["A".into(), "C".into(), "B".into()]);
        let r = FrameRenderer::with_text(&cfg, roster, text()).unwrap();
        let plan = r.plan(&ScriptLine::new("B", "x"));
        let slots: Vec<usize> = plan.iter().map(|p| p.slot).collect();
        assert_eq!(slots, [0, 2]);
        assert_eq!(plan[1].opacity, 1.0);
        assert_eq!(r.plan(&ScriptLine::new("B", "y")), plan);
    }

    #[test]
    fn render_script_writes_indexed_frames() {
        let dir = temp_dir("script");
        let cfg = fixture(&dir, true);
        let script = Script::new(vec![
            ScriptLine::new(NARRATOR, "Herbert looks at the map."),
            ScriptLine::new("A", "I am lost."),
        ]);
        let roster = Roster::compute(&script, cfg.character_keys());
        let r = FrameRenderer::with_text(&cfg, roster, text()).unwrap();
        let mut seen = Vec::new();
        let batch = r
            .render_script(&script, &dir.join("frames"), &mut |f| seen.push(f))
            .unwrap();
        assert!(batch.issues.is_empty());
        assert_eq!(seen, [0.5, 1.0]);
        for (i, line) in batch.output.iter().enumerate() {
            let p = line.image_path.as_ref().unwrap();
            assert!(p.is_absolute());
            assert!(p.ends_with(format!("frame_{i}.png")));
            assert!(p.exists());
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
