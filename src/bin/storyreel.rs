use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use storyreel::{
    Config, FrameRenderer, GoogleTts, Lesson, MontageComposer, Progress, Roster, Script, Variant,
    Workspace, format_elapsed, load_vocab,
};

#[derive(Parser, Debug)]
#[command(name = "storyreel", version)]
struct Cli {
    /// Verbose logging (overridden by RUST_LOG).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the social and/or web video for a lesson (requires `ffmpeg` and `ffprobe` on PATH).
    Render(RenderArgs),
    /// Print the on-stage roster of a script.
    Roster(ScriptArgs),
    /// Render a single script line as a PNG frame.
    Frame(FrameArgs),
}

#[derive(Args, Debug)]
struct ScriptArgs {
    /// Configuration JSON (characters, narrator, settings).
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Parsed script JSON.
    #[arg(long)]
    script: PathBuf,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    input: ScriptArgs,

    /// Lesson id; names the output files.
    #[arg(long)]
    lesson_id: String,

    /// Lesson title for the title card and overlay.
    #[arg(long)]
    title: Option<String>,

    /// Vocabulary list JSON (`[{word, translation, example}]`).
    #[arg(long)]
    vocab: Option<PathBuf>,

    /// Output directory.
    #[arg(long, default_value = "output")]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = VariantChoice::All)]
    variant: VariantChoice,

    /// Keep the per-run workspace for inspection.
    #[arg(long)]
    keep_workspace: bool,
}

#[derive(Args, Debug)]
struct FrameArgs {
    #[command(flatten)]
    input: ScriptArgs,

    /// Line index (0-based).
    #[arg(long)]
    line: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VariantChoice {
    All,
    Social,
    Web,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Roster(args) => cmd_roster(args),
        Command::Frame(args) => cmd_frame(args),
    }
}

fn init_logging(debug: bool) {
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_inputs(args: &ScriptArgs) -> anyhow::Result<(Config, Script)> {
    let config = Config::load(&args.config)?;
    let script = Script::load(&args.script)?;
    Ok((config, script))
}

/// Logs a line whenever the whole-percent value changes.
fn progress_logger() -> impl FnMut(&Progress) {
    let mut last = None;
    move |p: &Progress| {
        let percent = (p.fraction * 100.0).floor() as u32;
        if last == Some(percent) {
            return;
        }
        last = Some(percent);
        info!(
            percent,
            elapsed = %format_elapsed(p.elapsed),
            remaining = %p.remaining.map(format_elapsed).unwrap_or_else(|| "?".to_string()),
            "{}",
            p.message
        );
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let (config, script) = load_inputs(&args.input)?;
    if !storyreel::ffmpeg_tools_available() {
        anyhow::bail!("ffmpeg and ffprobe must be on PATH to render videos");
    }
    let engine = GoogleTts::from_env()?;

    let mut lesson = Lesson::new(&args.lesson_id);
    if let Some(title) = &args.title {
        lesson = lesson.with_title(title);
    }
    if let Some(vocab) = &args.vocab {
        lesson = lesson.with_vocab(load_vocab(vocab)?);
    }
    lesson.validate()?;

    let composer =
        MontageComposer::new(&config, &engine, &args.out).keep_workspace(args.keep_workspace);
    let mut sink = progress_logger();

    let single = match args.variant {
        VariantChoice::All => None,
        VariantChoice::Social => Some(Variant::Social),
        VariantChoice::Web => Some(Variant::Web),
    };

    let Some(variant) = single else {
        let summary = composer.run_all(&lesson, &script, &mut sink)?;
        let mut failed = 0;
        for (variant, outcome) in summary.outcomes() {
            match outcome {
                Ok(out) => {
                    println!("{variant}: {}", out.path.display());
                    for issue in &out.issues {
                        eprintln!("  skipped {issue}");
                    }
                }
                Err(e) => {
                    error!(%variant, error = %e, "variant failed");
                    failed += 1;
                }
            }
        }
        info!(elapsed = %format_elapsed(summary.elapsed), "run finished");
        if failed > 0 {
            anyhow::bail!("{failed} of 2 videos failed");
        }
        return Ok(());
    };

    let workspace = Workspace::create(&args.out, &lesson.id, args.keep_workspace)?;
    let result = match variant {
        Variant::Social => composer.make_social(&lesson, &script, &workspace, &mut sink),
        Variant::Web => composer.make_web(&lesson, &script, &workspace, &mut sink),
    };
    workspace.cleanup()?;
    let out = result?;
    println!("{variant}: {}", out.path.display());
    Ok(())
}

fn cmd_roster(args: ScriptArgs) -> anyhow::Result<()> {
    let (config, script) = load_inputs(&args)?;
    let roster = Roster::compute(&script, config.character_keys());
    for (slot, key) in roster.members().iter().enumerate() {
        println!("{slot}: {key}");
    }
    for name in roster.unresolved() {
        println!("unresolved: {name}");
    }
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let (config, script) = load_inputs(&args.input)?;
    let line = script
        .lines()
        .get(args.line)
        .with_context(|| format!("script has {} lines, no line {}", script.len(), args.line))?;

    let roster = Roster::compute(&script, config.character_keys());
    let renderer = FrameRenderer::prepare(&config, roster)?;
    let frame = renderer.render_line(line)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    frame
        .save(&args.out)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
