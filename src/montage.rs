//! Orchestration of the social and web videos for one lesson.
//!
//! Each variant runs as a chain of stages over its own workspace directory:
//! roster, audio, one or two frame/assembly passes, extra clips, concatenation and the final
//! layered export. A variant that fails reports the stage it failed in; the other variant
//! still runs.

pub mod compose;
pub mod workspace;

use std::{
    fmt,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::Context as _;
use tracing::{error, info, warn};

pub use compose::{FinalLayers, pick_music, plan_final_pass};
pub use workspace::Workspace;

use crate::{
    assets::media::{probe_duration_secs, probe_media},
    audio::{AudioSynthesizer, SpeechEngine},
    config::Config,
    encode_ffmpeg::{EncodeConfig, normalize_clip, still_clip},
    error::{Batch, LineIssue, ReelError, ReelResult},
    foundation::progress::{Progress, ProgressSink, ProgressTracker, estimate_remaining},
    frame::{
        FrameRenderer, TextRasterizer,
        cards::{render_separator, render_title_card, render_title_overlay},
        layout::{CANVAS_HEIGHT, CANVAS_WIDTH},
    },
    roster::Roster,
    script::Script,
    segment::{assemble_script, build_segment, concat_segments, write_concat_manifest},
    vocab::{SummarySlideFactory, VocabAssetFactory, VocabEntry},
};

pub const SEPARATOR_SECS: f64 = 1.0;
pub const TITLE_CARD_SECS: f64 = 3.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Short teaser: intro, listening challenge, separator, reading pass, vocabulary.
    Social,
    /// Full story preceded by a title card.
    Web,
}

impl Variant {
    pub fn name(self) -> &'static str {
        match self {
            Self::Social => "social",
            Self::Web => "web",
        }
    }

    pub fn output_file_name(self, lesson_id: &str) -> String {
        match self {
            Self::Social => format!("{lesson_id}.mp4"),
            Self::Web => format!("{lesson_id}_web.mp4"),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lesson metadata that accompanies the script.
#[derive(Clone, Debug, Default)]
pub struct Lesson {
    pub id: String,
    pub title: Option<String>,
    pub vocab: Vec<VocabEntry>,
}

impl Lesson {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.title = (!title.trim().is_empty()).then_some(title);
        self
    }

    pub fn with_vocab(mut self, vocab: Vec<VocabEntry>) -> Self {
        self.vocab = vocab;
        self
    }

    pub fn validate(&self) -> ReelResult<()> {
        if self.id.trim().is_empty() {
            return Err(ReelError::config("lesson id must be non-empty"));
        }
        if self.id.contains(['/', '\\']) || self.id == "." || self.id == ".." {
            return Err(ReelError::config(format!(
                "lesson id '{}' must be a plain file name",
                self.id
            )));
        }
        Ok(())
    }
}

/// A finished variant: the exported file and every line that had to be skipped on the way.
#[derive(Clone, Debug)]
pub struct VariantOutput {
    pub variant: Variant,
    pub path: PathBuf,
    pub issues: Vec<LineIssue>,
}

/// Result of [`MontageComposer::run_all`]: one outcome per variant.
#[derive(Debug)]
pub struct RunSummary {
    pub social: ReelResult<VariantOutput>,
    pub web: ReelResult<VariantOutput>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn outcomes(&self) -> [(Variant, &ReelResult<VariantOutput>); 2] {
        [(Variant::Social, &self.social), (Variant::Web, &self.web)]
    }

    pub fn all_succeeded(&self) -> bool {
        self.social.is_ok() && self.web.is_ok()
    }
}

/// Mutable state of one variant run.
struct VariantRun<'p> {
    variant: Variant,
    tracker: ProgressTracker<'p>,
    issues: Vec<LineIssue>,
    clips: Vec<PathBuf>,
}

impl<'p> VariantRun<'p> {
    fn new(variant: Variant, sink: &'p mut dyn ProgressSink) -> Self {
        Self {
            variant,
            tracker: ProgressTracker::new(sink),
            issues: Vec::new(),
            clips: Vec::new(),
        }
    }

    /// Run a per-line batch stage that ends at run fraction `end`, keeping its issues.
    fn batch<T>(
        &mut self,
        stage: &'static str,
        end: f64,
        f: impl FnOnce(&mut dyn FnMut(f64)) -> ReelResult<Batch<T>>,
    ) -> ReelResult<T> {
        self.tracker.begin_stage(end, stage);
        let fail = stage_error(self.variant, stage);
        let tracker = &mut self.tracker;
        let batch = f(&mut |x: f64| tracker.update(x)).map_err(fail)?;
        self.tracker.finish_stage();
        for issue in &batch.issues {
            warn!(variant = %self.variant, %issue, "line skipped");
        }
        self.issues.extend(batch.issues);
        Ok(batch.output)
    }

    /// Run a single-shot stage that ends at run fraction `end`.
    fn single<T>(
        &mut self,
        stage: &'static str,
        end: f64,
        f: impl FnOnce() -> ReelResult<T>,
    ) -> ReelResult<T> {
        self.tracker.begin_stage(end, stage);
        let out = f().map_err(stage_error(self.variant, stage))?;
        self.tracker.finish_stage();
        Ok(out)
    }
}

fn stage_error(variant: Variant, stage: &'static str) -> impl FnOnce(ReelError) -> ReelError {
    move |e| e.at_stage(variant.name(), stage)
}

/// Forwards a variant's progress into its share of a multi-variant run.
struct ScaledSink<'s> {
    inner: &'s mut dyn ProgressSink,
    started: Instant,
    offset: f64,
    span: f64,
    variant: Variant,
}

impl ProgressSink for ScaledSink<'_> {
    fn report(&mut self, progress: &Progress) {
        let fraction = self.offset + self.span * progress.fraction;
        let elapsed = self.started.elapsed();
        self.inner.report(&Progress {
            fraction,
            message: format!("{}: {}", self.variant, progress.message),
            elapsed,
            remaining: estimate_remaining(elapsed, fraction),
        });
    }
}

/// Builds the social and web videos of a lesson from one base script.
pub struct MontageComposer<'a> {
    config: &'a Config,
    engine: &'a dyn SpeechEngine,
    text: TextRasterizer,
    vocab_factory: Option<&'a dyn VocabAssetFactory>,
    out_dir: PathBuf,
    keep_workspace: bool,
}

impl<'a> MontageComposer<'a> {
    pub fn new(config: &'a Config, engine: &'a dyn SpeechEngine, out_dir: impl Into<PathBuf>) -> Self {
        let text = TextRasterizer::new(&config.asset_path(&config.settings.font_path));
        Self {
            config,
            engine,
            text,
            vocab_factory: None,
            out_dir: out_dir.into(),
            keep_workspace: false,
        }
    }

    /// Replace the default summary-slide vocabulary factory.
    pub fn with_vocab_factory(mut self, factory: &'a dyn VocabAssetFactory) -> Self {
        self.vocab_factory = Some(factory);
        self
    }

    pub fn with_text(mut self, text: TextRasterizer) -> Self {
        self.text = text;
        self
    }

    pub fn keep_workspace(mut self, keep: bool) -> Self {
        self.keep_workspace = keep;
        self
    }

    fn encode_config(&self) -> ReelResult<EncodeConfig> {
        let cfg = EncodeConfig::from_config(self.config, CANVAS_WIDTH, CANVAS_HEIGHT);
        cfg.validate()?;
        Ok(cfg)
    }

    fn synthesizer(&self) -> AudioSynthesizer<'a> {
        AudioSynthesizer::new(self.config, self.engine)
    }

    fn final_path(&self, variant: Variant, lesson: &Lesson) -> ReelResult<PathBuf> {
        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("create output directory '{}'", self.out_dir.display()))?;
        let p = self.out_dir.join(variant.output_file_name(&lesson.id));
        Ok(std::path::absolute(&p).with_context(|| format!("resolve '{}'", p.display()))?)
    }

    /// Produce both variants. Each variant gets half of the progress range; a failure in one
    /// does not stop the other.
    #[tracing::instrument(skip_all, fields(lesson = %lesson.id, lines = script.len()))]
    pub fn run_all(
        &self,
        lesson: &Lesson,
        script: &Script,
        sink: &mut dyn ProgressSink,
    ) -> ReelResult<RunSummary> {
        lesson.validate()?;
        let started = Instant::now();
        let workspace = Workspace::create(&self.out_dir, &lesson.id, self.keep_workspace)?;

        let social = {
            let mut scaled = ScaledSink {
                inner: &mut *sink,
                started,
                offset: 0.0,
                span: 0.5,
                variant: Variant::Social,
            };
            self.make_social(lesson, script, &workspace, &mut scaled)
        };
        if let Err(e) = &social {
            error!(error = %e, "social video failed");
        }

        let web = {
            let mut scaled = ScaledSink {
                inner: &mut *sink,
                started,
                offset: 0.5,
                span: 0.5,
                variant: Variant::Web,
            };
            self.make_web(lesson, script, &workspace, &mut scaled)
        };
        if let Err(e) = &web {
            error!(error = %e, "web video failed");
        }

        workspace.cleanup()?;
        let elapsed = started.elapsed();
        sink.report(&Progress {
            fraction: 1.0,
            message: "done".to_string(),
            elapsed,
            remaining: Some(Duration::ZERO),
        });
        Ok(RunSummary {
            social,
            web,
            elapsed,
        })
    }

    /// Social teaser: `[intro?, listening, separator, reading, vocabulary?]` with logo,
    /// optional music and the title overlay.
    #[tracing::instrument(skip_all, fields(lesson = %lesson.id))]
    pub fn make_social(
        &self,
        lesson: &Lesson,
        script: &Script,
        workspace: &Workspace,
        sink: &mut dyn ProgressSink,
    ) -> ReelResult<VariantOutput> {
        let variant = Variant::Social;
        let mut run = VariantRun::new(variant, sink);
        let enc = run.single("setup", 0.01, || self.encode_config())?;
        let base = script.social_cut(self.config.settings.social_line_count);
        info!(lines = base.len(), "building social video");

        let roster = run.single("roster", 0.02, || Ok(self.roster_for(&base)))?;
        let audio_dir = workspace.variant_dir(variant);
        let voiced = run.batch("audio", 0.3, |p| {
            self.synthesizer().synthesize_script(&base, &audio_dir, p)
        })?;

        let renderer = run.single("frames", 0.32, || {
            FrameRenderer::with_text(self.config, roster, self.text.clone())
        })?;

        let masked = voiced.masked(&self.config.settings.listening_placeholder);
        let listening = self.pass(
            &mut run,
            &renderer,
            &masked,
            &workspace.pass_dir(variant, "listening"),
            "listening",
            (0.45, 0.55),
            &enc,
        );
        let reading = self.pass(
            &mut run,
            &renderer,
            &voiced,
            &workspace.pass_dir(variant, "reading"),
            "reading",
            (0.68, 0.78),
            &enc,
        );

        let montage_dir = workspace.montage_dir(variant);
        run.tracker.begin_stage(0.85, "extra clips");
        if let Some(intro) = self.intro_clip(&montage_dir, &enc) {
            run.clips.push(intro);
        }
        match (listening, reading) {
            (Ok(l), Ok(r)) => {
                run.clips.push(l);
                match self.separator_clip(&montage_dir, &enc) {
                    Ok(sep) => run.clips.push(sep),
                    Err(e) => warn!(error = %e, "separator clip failed, continuing without it"),
                }
                run.clips.push(r);
            }
            (Ok(l), Err(e)) => {
                error!(error = %e, "reading pass failed, continuing with listening only");
                run.clips.push(l);
            }
            (Err(e), Ok(r)) => {
                error!(error = %e, "listening pass failed, continuing with reading only");
                run.clips.push(r);
            }
            (Err(le), Err(re)) => {
                error!(error = %le, "listening pass failed");
                return Err(re);
            }
        }
        if let Some(vocab) = self.vocab_clip(lesson, &montage_dir, &enc) {
            run.clips.push(vocab);
        }
        run.tracker.finish_stage();

        let title_overlay = match &lesson.title {
            Some(title) => self.title_overlay(title, &montage_dir),
            None => None,
        };
        self.finish(run, lesson, &montage_dir, title_overlay, &enc)
    }

    /// Web video: a title card (when the title is known) followed by the full story.
    #[tracing::instrument(skip_all, fields(lesson = %lesson.id))]
    pub fn make_web(
        &self,
        lesson: &Lesson,
        script: &Script,
        workspace: &Workspace,
        sink: &mut dyn ProgressSink,
    ) -> ReelResult<VariantOutput> {
        let variant = Variant::Web;
        let mut run = VariantRun::new(variant, sink);
        let enc = run.single("setup", 0.01, || self.encode_config())?;
        info!(lines = script.len(), "building web video");

        let roster = run.single("roster", 0.02, || Ok(self.roster_for(script)))?;
        let audio_dir = workspace.variant_dir(variant);
        let voiced = run.batch("audio", 0.4, |p| {
            self.synthesizer().synthesize_script(script, &audio_dir, p)
        })?;
        let renderer = run.single("frames", 0.42, || {
            FrameRenderer::with_text(self.config, roster, self.text.clone())
        })?;
        let story = self.pass(
            &mut run,
            &renderer,
            &voiced,
            &workspace.pass_dir(variant, "story"),
            "story",
            (0.65, 0.85),
            &enc,
        )?;

        let montage_dir = workspace.montage_dir(variant);
        run.tracker.begin_stage(0.88, "title card");
        if let Some(title) = &lesson.title {
            match self.title_card_clip(title, &montage_dir, &enc) {
                Ok(card) => run.clips.push(card),
                Err(e) => warn!(error = %e, "title card failed, continuing without it"),
            }
        }
        run.clips.push(story);
        run.tracker.finish_stage();

        self.finish(run, lesson, &montage_dir, None, &enc)
    }

    fn roster_for(&self, script: &Script) -> Roster {
        let roster = Roster::compute(script, self.config.character_keys());
        info!(members = ?roster.members(), unresolved = roster.unresolved().len(), "roster computed");
        roster
    }

    /// Frames then assembly for one pass; `ends` are the run fractions after each step.
    #[allow(clippy::too_many_arguments)]
    fn pass(
        &self,
        run: &mut VariantRun<'_>,
        renderer: &FrameRenderer<'_>,
        script: &Script,
        dir: &Path,
        name: &'static str,
        ends: (f64, f64),
        enc: &EncodeConfig,
    ) -> ReelResult<PathBuf> {
        let framed = run.batch(name, ends.0, |p| renderer.render_script(script, dir, p))?;
        let file = format!("{name}_part.mp4");
        run.batch(name, ends.1, |p| assemble_script(&framed, dir, &file, enc, p))
    }

    fn intro_clip(&self, montage_dir: &Path, enc: &EncodeConfig) -> Option<PathBuf> {
        let intro = self.config.asset_path(&self.config.settings.intro_video);
        if !intro.is_file() {
            info!(intro = %intro.display(), "no intro clip");
            return None;
        }
        let result = probe_media(&intro).and_then(|info| {
            normalize_clip(&intro, info.has_audio, &montage_dir.join("intro.mp4"), enc)
        });
        match result {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(intro = %intro.display(), error = %e, "intro clip unusable, skipping");
                None
            }
        }
    }

    fn separator_clip(&self, montage_dir: &Path, enc: &EncodeConfig) -> ReelResult<PathBuf> {
        let card = render_separator(
            &self.text,
            &self.config.settings.separator_text,
            enc.width,
            enc.height,
        )?;
        let png = save_card(&card, &montage_dir.join("separator.png"))?;
        still_clip(&png, SEPARATOR_SECS, &montage_dir.join("separator.mp4"), enc)
    }

    fn title_card_clip(&self, title: &str, montage_dir: &Path, enc: &EncodeConfig) -> ReelResult<PathBuf> {
        let bg = self.config.asset_path(&self.config.settings.lesson_background);
        let bg = bg.is_file().then_some(bg);
        if bg.is_none() {
            warn!("lesson background not found, using white title card");
        }
        let card = render_title_card(&self.text, title, bg.as_deref(), enc.width, enc.height)?;
        let png = save_card(&card, &montage_dir.join("title_card.png"))?;
        still_clip(&png, TITLE_CARD_SECS, &montage_dir.join("title_card.mp4"), enc)
    }

    fn title_overlay(&self, title: &str, montage_dir: &Path) -> Option<PathBuf> {
        let result = render_title_overlay(&self.text, title, CANVAS_WIDTH, CANVAS_HEIGHT)
            .and_then(|img| save_card(&img, &montage_dir.join("social_title_overlay.png")));
        match result {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "title overlay failed, exporting without it");
                None
            }
        }
    }

    fn vocab_clip(&self, lesson: &Lesson, montage_dir: &Path, enc: &EncodeConfig) -> Option<PathBuf> {
        if !self.config.settings.enable_vocab_section {
            return None;
        }
        if lesson.vocab.is_empty() {
            info!("no vocabulary for this lesson");
            return None;
        }

        let default_factory;
        let factory: &dyn VocabAssetFactory = match self.vocab_factory {
            Some(f) => f,
            None => {
                default_factory =
                    SummarySlideFactory::new(self.config, self.synthesizer(), self.text.clone());
                &default_factory
            }
        };

        let vocab_dir = montage_dir.join("vocab");
        let result = factory.build(&lesson.vocab, &vocab_dir).and_then(|assets| {
            let Some(assets) = assets else {
                return Ok(None);
            };
            let duration = probe_duration_secs(&assets.summary_audio)?;
            build_segment(
                &assets.summary_image,
                &assets.summary_audio,
                Some(duration),
                &montage_dir.join("vocab.mp4"),
                enc,
            )
            .map(Some)
        });
        match result {
            Ok(clip) => clip,
            Err(e) => {
                error!(error = %e, "vocabulary clip failed, skipping section");
                None
            }
        }
    }

    /// Concatenate the run's clips and export them with the final layers.
    fn finish(
        &self,
        mut run: VariantRun<'_>,
        lesson: &Lesson,
        montage_dir: &Path,
        title_overlay: Option<PathBuf>,
        enc: &EncodeConfig,
    ) -> ReelResult<VariantOutput> {
        let variant = run.variant;
        if run.clips.is_empty() {
            return Err(ReelError::NoSegments(variant.output_file_name(&lesson.id))
                .at_stage(variant.name(), "concatenate"));
        }

        let clips = std::mem::take(&mut run.clips);
        let sequence = run.single("concatenate", 0.9, || {
            let manifest = montage_dir.join("clips.txt");
            write_concat_manifest(&clips, &manifest)?;
            concat_segments(&manifest, &montage_dir.join("sequence.mp4"), true)
        })?;

        let out = self
            .final_path(variant, lesson)
            .map_err(stage_error(variant, "export"))?;
        let layers = self.final_layers(&sequence, title_overlay);
        let path = run.single("export", 1.0, || {
            compose::run_final_pass(&sequence, &layers, &out, enc)
        })?;
        run.tracker.finish(format!("{variant} video exported"));
        info!(out = %path.display(), issues = run.issues.len(), "{variant} video exported");

        Ok(VariantOutput {
            variant,
            path,
            issues: run.issues,
        })
    }

    fn final_layers(&self, sequence: &Path, title_overlay: Option<PathBuf>) -> FinalLayers {
        let s = &self.config.settings;
        let logo = self.config.asset_path(&s.logo_image);
        let logo = if logo.is_file() {
            Some(logo)
        } else {
            info!(logo = %logo.display(), "no logo overlay");
            None
        };

        let mut layers = FinalLayers {
            logo,
            title_overlay,
            ..FinalLayers::default()
        };
        if s.enable_music {
            layers.music = pick_music(&self.config.asset_path(&s.music_dir), &mut rand::thread_rng());
            if layers.music.is_some() {
                match probe_duration_secs(sequence) {
                    Ok(d) => layers.duration_secs = Some(d),
                    Err(e) => {
                        warn!(error = %e, "sequence duration unknown, skipping music");
                        layers.music = None;
                    }
                }
            }
        }
        layers
    }
}

fn save_card(img: &image::RgbaImage, path: &Path) -> ReelResult<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create card directory '{}'", parent.display()))?;
    }
    img.save(path)
        .with_context(|| format!("write card '{}'", path.display()))?;
    Ok(path.to_path_buf())
}
