use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// A progress snapshot: position and total duration in nanoseconds plus a
/// percentage in `[0, 100]` (fixed at 0 for live or unbounded inputs).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Progress {
    /// Current position in nanoseconds.
    pub position: i64,
    /// Total duration in nanoseconds, 0 when unknown or live.
    pub duration: i64,
    /// Completed percentage in `[0, 100]`, 0 for live inputs.
    pub percentage: f64,
}

#[derive(Debug)]
struct Inner {
    progress: Progress,
    last_update: Option<Instant>,
}

/// Tracks progress at coarse wall-clock granularity.
///
/// Updates are rate-limited to roughly the configured interval and the
/// reported position is monotonic non-decreasing while running; the
/// percentage is derived from the recorded duration, zero when the
/// duration is unknown.
#[derive(Debug)]
pub struct ProgressTracker {
    inner: Mutex<Inner>,
    interval: Duration,
}

impl ProgressTracker {
    /// Creates a tracker that accepts at most one update per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                progress: Progress::default(),
                last_update: None,
            }),
            interval,
        }
    }

    /// Resets position and percentage for a new run with the given total
    /// duration (0 for live inputs).
    pub fn reset(&self, duration: i64) {
        let mut inner = self.inner.lock();
        inner.progress = Progress {
            position: 0,
            duration,
            percentage: 0.0,
        };
        inner.last_update = None;
    }

    /// Updates the recorded total duration without disturbing the
    /// position, e.g. when the duration becomes known after start.
    pub fn set_duration(&self, duration: i64) {
        let mut inner = self.inner.lock();
        inner.progress.duration = duration;
        inner.progress.percentage = percentage_of(inner.progress.position, duration);
    }

    /// Current progress snapshot.
    pub fn snapshot(&self) -> Progress {
        self.inner.lock().progress
    }

    /// Offers a new position. Ignored unless the update interval has
    /// elapsed since the previous accepted update; positions moving
    /// backwards are clamped. Returns whether the snapshot changed.
    pub fn tick(&self, position: i64) -> bool {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        if let Some(last) = inner.last_update {
            if now.duration_since(last) < self.interval {
                return false;
            }
        }
        inner.last_update = Some(now);

        let position = position.max(inner.progress.position);
        inner.progress.position = position;
        inner.progress.percentage = percentage_of(position, inner.progress.duration);
        true
    }

    /// Forces the final 100%/full-duration snapshot. Used when the run
    /// reaches its natural end without interruption.
    pub fn complete(&self) {
        let mut inner = self.inner.lock();
        if inner.progress.duration > 0 {
            inner.progress.position = inner.progress.duration;
            inner.progress.percentage = 100.0;
        }
    }
}

fn percentage_of(position: i64, duration: i64) -> f64 {
    if duration <= 0 {
        return 0.0;
    }
    (position as f64 * 100.0 / duration as f64).clamp(0.0, 100.0)
}
