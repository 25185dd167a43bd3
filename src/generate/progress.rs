/// Progress accounting for a generation run
///
/// Workers bump atomic counters; snapshots are built and handed to the
/// observer under a lock so observers never see counts go backwards.
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Observer invoked after every counted unit. Must be cheap and non-blocking.
pub type ProgressCallback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Point-in-time view of a run
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProgressSnapshot {
    pub images_generated: u64,
    pub images_skipped: u64,
    /// Units whose write failed under the skip-and-continue policy
    pub images_failed: u64,
    pub total_images: u64,
    pub elapsed_seconds: f64,
    pub images_per_second: f64,
    /// `None` until the first image has been generated
    pub estimated_remaining_seconds: Option<f64>,
}

impl ProgressSnapshot {
    /// Units accounted for so far
    pub fn processed(&self) -> u64 {
        self.images_generated + self.images_skipped + self.images_failed
    }

    /// Completion in percent, 0.0..=100.0
    pub fn percent(&self) -> f32 {
        if self.total_images == 0 {
            return 100.0;
        }
        (self.processed() as f64 / self.total_images as f64 * 100.0) as f32
    }
}

/// Which counter a unit lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    Generated,
    Skipped,
    Failed,
}

/// Shared counters of one run
pub struct ProgressTracker {
    generated: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    total: u64,
    started: Instant,
    emit_lock: Mutex<()>,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub fn new(total: u64, callback: Option<ProgressCallback>) -> Self {
        Self {
            generated: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total,
            started: Instant::now(),
            emit_lock: Mutex::new(()),
            callback,
        }
    }

    /// Count one unit and notify the observer
    pub fn record(&self, outcome: UnitOutcome) {
        let counter = match outcome {
            UnitOutcome::Generated => &self.generated,
            UnitOutcome::Skipped => &self.skipped,
            UnitOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);

        if let Some(callback) = &self.callback {
            let _guard = self.emit_lock.lock();
            callback(self.snapshot());
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        compute_snapshot(
            self.generated.load(Ordering::SeqCst),
            self.skipped.load(Ordering::SeqCst),
            self.failed.load(Ordering::SeqCst),
            self.total,
            self.elapsed().as_secs_f64(),
        )
    }
}

/// Derive rate and ETA from raw counts
///
/// `remaining = elapsed / generated * (total - generated)` once something was
/// generated; `rate = generated / elapsed` once time has passed.
pub fn compute_snapshot(generated: u64, skipped: u64, failed: u64, total: u64, elapsed: f64) -> ProgressSnapshot {
    let estimated_remaining_seconds = if generated > 0 {
        Some(elapsed / generated as f64 * total.saturating_sub(generated) as f64)
    } else {
        None
    };
    let images_per_second = if elapsed > 0.0 { generated as f64 / elapsed } else { 0.0 };

    ProgressSnapshot {
        images_generated: generated,
        images_skipped: skipped,
        images_failed: failed,
        total_images: total,
        elapsed_seconds: elapsed,
        images_per_second,
        estimated_remaining_seconds,
    }
}

/// Human readable duration: `"2 Days, 3 h"` from one day up, else `"1 h 2 min 3 sec"`
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds as u64 } else { 0 };
    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    let secs = total % 60;

    if days > 0 {
        format!("{} Days, {} h", days, hours)
    } else {
        format!("{} h {} min {} sec", hours, minutes, secs)
    }
}
