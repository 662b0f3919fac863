//! Interval-based progress logging.
//!
//! A [`ProgressTracker`] counts items (records scanned, records partitioned,
//! blocks sorted) and logs a line each time the count crosses a multiple of its
//! interval. The count is atomic so worker threads can share one tracker.

use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

use crate::logging::format_count;

/// Default number of items between two progress lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// Thread-safe progress counter that logs at interval boundaries.
///
/// # Example
/// ```
/// use fastsort_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Partitioned records").with_interval(100);
/// for _ in 0..250 {
///     tracker.log_if_needed(1); // logs at 100 and 200
/// }
/// tracker.log_final(); // logs "Partitioned records 250 (complete)"
/// assert_eq!(tracker.count(), 250);
/// ```
pub struct ProgressTracker {
    message: String,
    interval: u64,
    total: Option<u64>,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Tracker with the default interval and no known total.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            interval: DEFAULT_PROGRESS_INTERVAL,
            total: None,
            count: AtomicU64::new(0),
        }
    }

    /// Log every `interval` items. Zero is treated as one.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Known number of items, shown as `count/total` in each line.
    #[must_use]
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    fn log_line(&self, count: u64, suffix: &str) {
        match self.total {
            Some(total) => {
                info!("{} {}/{}{suffix}", self.message, format_count(count), format_count(total));
            }
            None => info!("{} {}{suffix}", self.message, format_count(count)),
        }
    }

    /// Add `additional` items, logging once per interval boundary crossed.
    ///
    /// Returns `true` when the new count sits exactly on a boundary.
    pub fn log_if_needed(&self, additional: u64) -> bool {
        if additional == 0 {
            let count = self.count();
            return count > 0 && count.is_multiple_of(self.interval);
        }

        let previous = self.count.fetch_add(additional, Ordering::Relaxed);
        let current = previous + additional;
        for step in (previous / self.interval + 1)..=(current / self.interval) {
            self.log_line(step * self.interval, "");
        }
        current.is_multiple_of(self.interval)
    }

    /// Log the final count unless the last boundary line already showed it.
    pub fn log_final(&self) {
        if !self.log_if_needed(0) {
            let count = self.count();
            if count > 0 {
                self.log_line(count, " (complete)");
            }
        }
    }

    /// Items counted so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
