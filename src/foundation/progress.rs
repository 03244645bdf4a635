use std::time::{Duration, Instant};

/// A progress snapshot emitted after every unit of work.
#[derive(Clone, Debug)]
pub struct Progress {
    /// Overall completion in `0.0..=1.0`, never decreasing within one run.
    pub fraction: f64,
    pub message: String,
    pub elapsed: Duration,
    pub remaining: Option<Duration>,
}

pub trait ProgressSink {
    fn report(&mut self, progress: &Progress);
}

impl<F: FnMut(&Progress)> ProgressSink for F {
    fn report(&mut self, progress: &Progress) {
        self(progress)
    }
}

/// Sink that drops every update.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _progress: &Progress) {}
}

/// Maps stage-local fractions onto one monotonic run-wide fraction.
///
/// A run is split into consecutive stages with `begin_stage(end, ..)`; `update(local, ..)`
/// interpolates inside the current stage. Reported fractions are clamped so they never move
/// backwards, even if a stage reports out of order.
pub struct ProgressTracker<'a> {
    sink: &'a mut dyn ProgressSink,
    started: Instant,
    stage_start: f64,
    stage_end: f64,
    stage_label: String,
    reported: f64,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            sink,
            started: Instant::now(),
            stage_start: 0.0,
            stage_end: 0.0,
            stage_label: String::new(),
            reported: 0.0,
        }
    }

    pub fn fraction(&self) -> f64 {
        self.reported
    }

    /// Start a new stage that runs from the current fraction up to `end`.
    pub fn begin_stage(&mut self, end: f64, label: impl Into<String>) {
        self.stage_start = self.reported;
        self.stage_end = end.clamp(self.reported, 1.0);
        self.stage_label = label.into();
        self.emit(self.stage_start, self.stage_label.clone());
    }

    /// Report progress inside the current stage.
    pub fn update(&mut self, local: f64) {
        let local = if local.is_finite() {
            local.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let fraction = self.stage_start + (self.stage_end - self.stage_start) * local;
        self.emit(fraction, self.stage_label.clone());
    }

    pub fn finish_stage(&mut self) {
        self.update(1.0);
    }

    pub fn finish(&mut self, message: impl Into<String>) {
        self.stage_start = self.reported;
        self.stage_end = 1.0;
        self.emit(1.0, message.into());
    }

    fn emit(&mut self, fraction: f64, message: String) {
        self.reported = fraction.max(self.reported).min(1.0);
        let elapsed = self.started.elapsed();
        let remaining = estimate_remaining(elapsed, self.reported);
        self.sink.report(&Progress {
            fraction: self.reported,
            message,
            elapsed,
            remaining,
        });
    }
}

/// Linear extrapolation of the time left from the elapsed time and completed fraction.
pub fn estimate_remaining(elapsed: Duration, fraction: f64) -> Option<Duration> {
    if fraction <= 0.0 {
        return None;
    }
    let total = elapsed.as_secs_f64() / fraction;
    Some(Duration::from_secs_f64((total - elapsed.as_secs_f64()).max(0.0)))
}

/// Render a duration as `"1m 30s"` or `"45s"`.
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    let (m, s) = (secs / 60, secs % 60);
    if m > 0 { format!("{m}m {s}s") } else { format!("{s}s") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractions_never_decrease_across_stages() {
        let mut seen = Vec::new();
        let mut sink = |p: &Progress| seen.push(p.fraction);
        {
            let mut tracker = ProgressTracker::new(&mut sink);
            tracker.begin_stage(0.5, "audio");
            tracker.update(0.5);
            tracker.update(0.2);
            tracker.finish_stage();
            tracker.begin_stage(0.4, "frames");
            tracker.update(1.0);
            tracker.begin_stage(1.0, "export");
            tracker.update(0.5);
            tracker.finish("done");
        }
        assert!(seen.windows(2).all(|w| w[1] >= w[0]), "{seen:?}");
        assert_eq!(seen.last().copied(), Some(1.0));
        assert!((seen[1] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn non_finite_updates_are_ignored() {
        let mut last = 0.0;
        let mut sink = |p: &Progress| last = p.fraction;
        {
            let mut tracker = ProgressTracker::new(&mut sink);
            tracker.begin_stage(1.0, "x");
            tracker.update(f64::NAN);
        }
        assert_eq!(last, 0.0);
    }

    #[test]
    fn format_elapsed_matches_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(45)), "45s");
        assert_eq!(format_elapsed(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_elapsed(Duration::from_millis(999)), "0s");
    }

    #[test]
    fn remaining_is_unknown_before_any_progress() {
        assert!(estimate_remaining(Duration::from_secs(3), 0.0).is_none());
        let r = estimate_remaining(Duration::from_secs(10), 0.5).unwrap();
        assert_eq!(r.as_secs(), 10);
    }
}
