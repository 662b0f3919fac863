//! Run configuration for the block sorter.
//!
//! A [`SortConfig`] is built once from command-line options and handed by
//! reference to every stage of the run. Nothing reads configuration from global
//! state.

use std::path::PathBuf;

use crate::errors::{Result, SortError};

/// Default total memory budget (2 GiB).
pub const DEFAULT_TOTAL_MEMORY: u64 = 2 * 1024 * 1024 * 1024;

/// Default width of an aligned histogram bucket, in coordinate units.
pub const DEFAULT_INTERVAL_WIDTH: u64 = 1_000_000;

/// Default byte width of one unaligned segment.
pub const DEFAULT_UNALIGNED_SEGMENT_BYTES: u64 = 1024 * 1024;

/// Default number of records per sub-chunk for [`InBlockSort::SubChunked`].
pub const DEFAULT_SUB_CHUNK_RECORDS: usize = 10_000;

/// Default compression level handed to the encoder.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Default cap on block files the partitioner keeps open at once.
pub const DEFAULT_MAX_OPEN_FILES: usize = 256;

/// Descriptors left free under the process limit for the decoder pipes, the
/// workers and standard streams.
const RESERVED_FILE_DESCRIPTORS: u64 = 32;

/// How records are ordered inside one aligned block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InBlockSort {
    /// Sort the whole block by `(coordinate, arrival)`.
    #[default]
    Full,
    /// Sort fixed-size sub-chunks independently, without merging them.
    ///
    /// Only valid when sub-chunks do not overlap in coordinate. The sorter
    /// checks this after sorting and falls back to [`InBlockSort::Full`] when it
    /// does not hold.
    SubChunked {
        /// Records per sub-chunk.
        chunk_records: usize,
    },
}

/// What to do when the final concatenation step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcatFailurePolicy {
    /// Return an error and keep the sorted blocks on disk for recovery.
    #[default]
    Error,
    /// Log a warning, delete the intermediate files, and report success.
    Warn,
}

/// Configuration shared by every stage of a sort run.
#[derive(Debug, Clone)]
pub struct SortConfig {
    /// Total memory budget, split evenly across worker threads.
    pub total_memory: u64,
    /// Number of worker threads.
    pub threads: usize,
    /// Width of one aligned histogram bucket in coordinate units.
    pub interval_width: u64,
    /// Byte width of one unaligned segment.
    pub unaligned_segment_bytes: u64,
    /// Ordering strategy inside aligned blocks.
    pub in_block_sort: InBlockSort,
    /// Behaviour on a failed final concatenation.
    pub concat_failure: ConcatFailurePolicy,
    /// Parent directory for the run's scratch directory.
    pub temp_dir: Option<PathBuf>,
    /// Compression level passed to the encoder.
    pub compression_level: u32,
    /// Most block files kept open while partitioning.
    pub max_open_files: usize,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            total_memory: DEFAULT_TOTAL_MEMORY,
            threads: 1,
            interval_width: DEFAULT_INTERVAL_WIDTH,
            unaligned_segment_bytes: DEFAULT_UNALIGNED_SEGMENT_BYTES,
            in_block_sort: InBlockSort::Full,
            concat_failure: ConcatFailurePolicy::Error,
            temp_dir: None,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
        }
    }
}

impl SortConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total memory budget in bytes.
    #[must_use]
    pub fn total_memory(mut self, bytes: u64) -> Self {
        self.total_memory = bytes;
        self
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the aligned bucket width.
    #[must_use]
    pub fn interval_width(mut self, width: u64) -> Self {
        self.interval_width = width;
        self
    }

    /// Set the unaligned segment width in bytes.
    #[must_use]
    pub fn unaligned_segment_bytes(mut self, bytes: u64) -> Self {
        self.unaligned_segment_bytes = bytes;
        self
    }

    /// Set the in-block ordering strategy.
    #[must_use]
    pub fn in_block_sort(mut self, strategy: InBlockSort) -> Self {
        self.in_block_sort = strategy;
        self
    }

    /// Set the concatenation failure policy.
    #[must_use]
    pub fn concat_failure(mut self, policy: ConcatFailurePolicy) -> Self {
        self.concat_failure = policy;
        self
    }

    /// Set the parent directory for scratch files.
    #[must_use]
    pub fn temp_dir(mut self, path: PathBuf) -> Self {
        self.temp_dir = Some(path);
        self
    }

    /// Set the encoder compression level.
    #[must_use]
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Set the cap on block files open at once while partitioning.
    #[must_use]
    pub fn max_open_files(mut self, limit: usize) -> Self {
        self.max_open_files = limit;
        self
    }

    /// Block files the partitioner may keep open: `max_open_files`, lowered to
    /// fit under the process's soft open-file limit.
    #[must_use]
    pub fn effective_open_files(&self) -> usize {
        self.max_open_files.min(open_file_headroom()).max(1)
    }

    /// Memory available to a single worker, and the upper bound on the planned
    /// size of an aligned block.
    #[must_use]
    pub fn per_thread_memory(&self) -> u64 {
        self.total_memory / self.threads.max(1) as u64
    }

    /// Unaligned segment width actually used: never wider than one block.
    #[must_use]
    pub fn effective_segment_bytes(&self) -> u64 {
        self.unaligned_segment_bytes.min(self.per_thread_memory()).max(1)
    }

    /// Check that the configuration can drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(SortError::invalid_parameter("threads", "must be >= 1"));
        }
        if self.total_memory == 0 {
            return Err(SortError::invalid_parameter("memory", "must be greater than 0"));
        }
        if self.per_thread_memory() == 0 {
            return Err(SortError::invalid_parameter(
                "memory",
                format!(
                    "{} bytes shared by {} threads leaves nothing per thread",
                    self.total_memory, self.threads
                ),
            ));
        }
        if self.interval_width == 0 {
            return Err(SortError::invalid_parameter("interval-width", "must be greater than 0"));
        }
        if self.unaligned_segment_bytes == 0 {
            return Err(SortError::invalid_parameter(
                "unaligned-segment-bytes",
                "must be greater than 0",
            ));
        }
        if let InBlockSort::SubChunked { chunk_records: 0 } = self.in_block_sort {
            return Err(SortError::invalid_parameter("sub-chunk-records", "must be >= 1"));
        }
        if self.max_open_files == 0 {
            return Err(SortError::invalid_parameter("max-open-files", "must be >= 1"));
        }
        if self.compression_level > 9 {
            return Err(SortError::invalid_parameter(
                "compression-level",
                format!("{} is outside 0-9", self.compression_level),
            ));
        }
        Ok(())
    }
}

/// Descriptors available for block files under the soft `RLIMIT_NOFILE`.
#[cfg(unix)]
fn open_file_headroom() -> usize {
    match rlimit::getrlimit(rlimit::Resource::NOFILE) {
        Ok((soft, _)) => {
            usize::try_from(soft.saturating_sub(RESERVED_FILE_DESCRIPTORS)).unwrap_or(usize::MAX)
        }
        Err(_) => usize::MAX,
    }
}

#[cfg(not(unix))]
fn open_file_headroom() -> usize {
    usize::MAX
}
