mod common;

use std::path::PathBuf;

use storyreel::{
    EncodeConfig, ReelError, Script, ScriptLine, assets::media::probe_duration_secs,
    segment::assemble_script,
};

fn small_cfg() -> EncodeConfig {
    EncodeConfig {
        width: 270,
        height: 480,
        fps: 30,
        video_codec: "libx264".to_string(),
        preset: None,
        audio_codec: "aac".to_string(),
        overwrite: true,
    }
}

fn voiced_line(dir: &std::path::Path, i: usize, secs: f64, with_frame: bool) -> ScriptLine {
    let audio = dir.join(format!("line_{i}.wav"));
    std::fs::write(&audio, common::silent_wav(secs)).unwrap();
    let line = ScriptLine::new("Herbert", format!("line {i}")).with_audio(audio, secs);
    if !with_frame {
        return line;
    }
    let frame: PathBuf = dir.join(format!("frame_{i}.png"));
    common::write_png(&frame, 270, 480, [20 * i as u8, 80, 160, 255]);
    line.with_image(frame)
}

#[test]
fn joined_video_lasts_as_long_as_its_audio() {
    if !storyreel::ffmpeg_tools_available() {
        return;
    }
    let dir = common::temp_dir("segment_join");
    let durations = [0.5, 0.7, 1.0];
    let script: Script = durations
        .iter()
        .enumerate()
        .map(|(i, d)| voiced_line(&dir, i, *d, true))
        .collect();

    let mut reported = Vec::new();
    let batch = assemble_script(&script, &dir, "story_part.mp4", &small_cfg(), &mut |x| {
        reported.push(x)
    })
    .unwrap();

    assert!(batch.issues.is_empty());
    assert!(batch.output.is_absolute());
    assert_eq!(reported.last().copied(), Some(1.0));
    for i in 0..3 {
        assert!(dir.join("temp").join(format!("segment_{i}.mp4")).is_file());
    }
    let total = probe_duration_secs(&batch.output).unwrap();
    let expected: f64 = durations.iter().sum();
    assert!((total - expected).abs() < 0.25, "duration {total} vs {expected}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn lines_without_frames_are_skipped_and_reported() {
    if !storyreel::ffmpeg_tools_available() {
        return;
    }
    let dir = common::temp_dir("segment_skip");
    let script = Script::new(vec![
        voiced_line(&dir, 0, 0.6, true),
        voiced_line(&dir, 1, 0.8, false),
        voiced_line(&dir, 2, 0.6, true),
    ]);
    let batch = assemble_script(&script, &dir, "reading_part.mp4", &small_cfg(), &mut |_| {}).unwrap();

    assert_eq!(batch.issues.len(), 1);
    assert_eq!(batch.issues[0].index, 1);
    assert_eq!(batch.issues[0].stage, "segment");
    assert!(!dir.join("temp").join("segment_1.mp4").exists());
    let total = probe_duration_secs(&batch.output).unwrap();
    assert!((total - 1.2).abs() < 0.25, "duration {total}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn empty_script_produces_no_segments_error() {
    let dir = common::temp_dir("segment_none");
    let err = assemble_script(&Script::default(), &dir, "story_part.mp4", &small_cfg(), &mut |_| {})
        .unwrap_err();
    assert!(matches!(err, ReelError::NoSegments(ref f) if f == "story_part.mp4"));
    assert!(!dir.join("story_part.mp4").exists());
    let _ = std::fs::remove_dir_all(&dir);
}
