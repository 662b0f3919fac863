//! Formatting helpers and stage timing for log output.
//!
//! Every stage of a sort run (scan, plan, partition, block sort, reassembly) is
//! wrapped in an [`OperationTimer`], and the run ends with a summary produced by
//! [`log_sort_summary`].

use std::time::{Duration, Instant};

use crate::sort::{PartitionPlan, SortStats};

/// Formats an integer with thousands separators.
///
/// # Examples
///
/// ```
/// use fastsort_lib::logging::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a byte count using binary units.
///
/// # Examples
///
/// ```
/// use fastsort_lib::logging::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.5 KiB");
/// assert_eq!(format_bytes(2 * 1024 * 1024 * 1024), "2.0 GiB");
/// ```
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Formats a duration in human-readable form.
///
/// # Examples
///
/// ```
/// use fastsort_lib::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(45)), "45s");
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// assert_eq!(format_duration(Duration::from_secs(5400)), "1h 30m");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        if remaining_secs == 0 { format!("{mins}m") } else { format!("{mins}m {remaining_secs}s") }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
    }
}

/// Formats a rate (items per second).
///
/// # Examples
///
/// ```
/// use fastsort_lib::logging::format_rate;
/// use std::time::Duration;
///
/// assert_eq!(format_rate(1000, Duration::from_secs(1)), "1,000 items/s");
/// assert_eq!(format_rate(30, Duration::from_secs(60)), "30.0 items/min");
/// ```
#[must_use]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} items/s", format_count(count));
    }

    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} items/s", format_count(rate as u64))
    } else {
        let items_per_min = count as f64 / (secs / 60.0);
        format!("{items_per_min:.1} items/min")
    }
}

/// Logs a one-line overview of a partition plan, with the block table at
/// debug level.
pub fn log_plan_summary(plan: &PartitionPlan) {
    log::info!(
        "Planned {} blocks ({} aligned, {} bypass) under a budget of {} per thread",
        plan.blocks().len(),
        plan.aligned_block_count(),
        plan.bypass_block_count(),
        format_bytes(plan.budget())
    );
    log_block_table(plan, log::Level::Debug);
}

/// Logs one line per planned block at `level`.
pub fn log_block_table(plan: &PartitionPlan, level: log::Level) {
    for block in plan.blocks() {
        log::log!(
            level,
            "  block {:>5} {:<8} {:>12} {:>12} lines{}",
            block.id,
            block.kind.to_string(),
            format_bytes(block.bytes),
            format_count(block.lines),
            if block.oversized { "  (over budget)" } else { "" }
        );
    }
}

/// Logs the end-of-run summary.
pub fn log_sort_summary(stats: &SortStats) {
    log::info!("Sort Summary:");
    log::info!("  Header lines: {}", format_count(stats.header_lines));
    log::info!("  Records read: {}", format_count(stats.total_records));
    log::info!("  Records written: {}", format_count(stats.output_records));
    log::info!(
        "  Blocks: {} aligned, {} bypass",
        format_count(stats.aligned_blocks as u64),
        format_count(stats.bypass_blocks as u64)
    );
    if stats.oversized_blocks > 0 {
        log::info!("  Blocks over the per-thread budget: {}", stats.oversized_blocks);
    }
    if stats.sub_chunk_fallbacks > 0 {
        log::info!("  Blocks sorted whole after sub-chunk overlap: {}", stats.sub_chunk_fallbacks);
    }
    if stats.concatenation_failed {
        log::warn!("  Final concatenation reported a failure; output may be incomplete");
    }
}

/// Operation timing and summary helper.
///
/// # Examples
///
/// ```no_run
/// use fastsort_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Scanning records");
///
/// // ... do work ...
///
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Time elapsed since the timer was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Logs the completion with item count and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.elapsed();
        log::info!(
            "{} completed: {} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
