mod common;

use common::FakeTts;
use storyreel::{
    AudioSynthesizer, EncodeConfig, FrameRenderer, Lesson, MontageComposer, NARRATOR, Progress,
    ReelError, Roster, Script, ScriptLine, TextRasterizer, Variant, assets::media::probe_duration_secs,
    segment::assemble_script,
};

fn story() -> Script {
    Script::new(vec![
        ScriptLine::new(NARRATOR, "Herbert looks at the old map."),
        ScriptLine::new("Herbert", "I think we are lost."),
    ])
}

#[test]
fn two_lines_give_two_of_everything() {
    if !storyreel::ffmpeg_tools_available() {
        return;
    }
    let dir = common::temp_dir("e2e_stages");
    let cfg = common::fixture_config(&dir);
    let script = story();
    let engine = FakeTts;

    let voiced = AudioSynthesizer::new(&cfg, &engine)
        .synthesize_script(&script, &dir.join("audio"), &mut |_| {})
        .unwrap();
    assert!(voiced.issues.is_empty());
    let audio: Vec<_> = voiced.output.iter().filter_map(|l| l.audio_path.clone()).collect();
    assert_eq!(audio.len(), 2);
    assert!(audio.iter().all(|p| p.is_absolute() && p.is_file()));

    let roster = Roster::compute(&voiced.output, cfg.character_keys());
    assert_eq!(roster.members(), ["Herbert"]);
    let renderer =
        FrameRenderer::with_text(&cfg, roster, TextRasterizer::new(&dir.join("font.ttf"))).unwrap();
    let framed = renderer
        .render_script(&voiced.output, &dir.join("frames"), &mut |_| {})
        .unwrap();
    assert!(framed.issues.is_empty());
    for i in 0..2 {
        assert!(dir.join("frames").join(format!("frame_{i}.png")).is_file());
    }

    let enc = EncodeConfig::from_config(&cfg, 1080, 1920);
    let joined = assemble_script(&framed.output, &dir.join("frames"), "story_part.mp4", &enc, &mut |_| {})
        .unwrap();
    assert!(dir.join("frames/temp/segment_0.mp4").is_file());
    assert!(dir.join("frames/temp/segment_1.mp4").is_file());
    assert!(!dir.join("frames/temp/segment_2.mp4").exists());

    let expected = framed.output.total_duration_secs();
    let sum: f64 = script.iter().map(|l| FakeTts::seconds_for(&l.text)).sum();
    assert!((expected - sum).abs() < 0.05, "measured {expected} vs synthesized {sum}");
    let total = probe_duration_secs(&joined.output).unwrap();
    assert!((total - expected).abs() < 0.25, "duration {total} vs {expected}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn run_all_exports_both_variants() {
    if !storyreel::ffmpeg_tools_available() {
        return;
    }
    let dir = common::temp_dir("e2e_run_all");
    let cfg = common::fixture_config(&dir);
    let engine = FakeTts;
    let out = dir.join("output");
    let composer = MontageComposer::new(&cfg, &engine, &out);

    let mut fractions = Vec::new();
    let summary = composer
        .run_all(&Lesson::new("lesson-7"), &story(), &mut |p: &Progress| {
            fractions.push(p.fraction)
        })
        .unwrap();

    assert!(summary.all_succeeded());
    let social = summary.social.as_ref().unwrap();
    let web = summary.web.as_ref().unwrap();
    assert_eq!(social.variant, Variant::Social);
    assert!(social.path.ends_with("lesson-7.mp4"));
    assert!(web.path.ends_with("lesson-7_web.mp4"));
    assert!(social.path.is_file() && web.path.is_file());
    assert!(!out.join("work-lesson-7").exists());

    let sum: f64 = story().iter().map(|l| FakeTts::seconds_for(&l.text)).sum();
    let web_secs = probe_duration_secs(&web.path).unwrap();
    assert!((web_secs - sum).abs() < 0.3, "web {web_secs} vs {sum}");
    // listening, one second separator, reading
    let social_secs = probe_duration_secs(&social.path).unwrap();
    let social_expected = 2.0 * sum + 1.0;
    assert!(
        (social_secs - social_expected).abs() < 0.5,
        "social {social_secs} vs {social_expected}"
    );

    assert!(fractions.windows(2).all(|w| w[1] >= w[0] - 1e-9), "{fractions:?}");
    assert_eq!(fractions.last().copied(), Some(1.0));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn silent_script_fails_both_variants_without_stopping_the_run() {
    let dir = common::temp_dir("e2e_silent");
    let cfg = common::fixture_config(&dir);
    let engine = FakeTts;
    let composer = MontageComposer::new(&cfg, &engine, dir.join("output"));
    let script = Script::new(vec![ScriptLine::new("Herbert", "   ")]);

    let summary = composer
        .run_all(&Lesson::new("quiet"), &script, &mut |_: &Progress| {})
        .unwrap();
    assert!(!summary.all_succeeded());
    for (variant, outcome) in summary.outcomes() {
        let Err(ReelError::Stage { variant: v, source, .. }) = outcome else {
            panic!("{variant} should fail at a stage");
        };
        assert_eq!(v, variant.name());
        assert!(matches!(**source, ReelError::NoSegments(_)), "{source}");
    }
    assert!(!dir.join("output").join("quiet.mp4").exists());
    let _ = std::fs::remove_dir_all(&dir);
}
