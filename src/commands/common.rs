//! Common CLI options shared across commands.
//!
//! The options here are composed into command structs with
//! `#[command(flatten)]`.

use std::path::PathBuf;

use clap::{Args, ValueEnum};

use fastsort_lib::config::{
    ConcatFailurePolicy, DEFAULT_COMPRESSION_LEVEL, DEFAULT_MAX_OPEN_FILES,
    DEFAULT_SUB_CHUNK_RECORDS, InBlockSort, SortConfig,
};
use fastsort_lib::toolkit::{AlignmentToolkit, PlainText, Sambamba, Samtools};

/// Parse a memory size such as "512M", "1G" or "1.5g".
///
/// A bare number is taken as bytes.
pub fn parse_memory(s: &str) -> Result<u64, String> {
    let s = s.trim().to_uppercase();

    if s.is_empty() {
        return Err("Empty memory specification".to_string());
    }

    let (num_str, multiplier): (&str, u32) = if let Some(n) = s.strip_suffix('G') {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('K') {
        (n, 1024)
    } else {
        (s.as_str(), 1)
    };

    let num: f64 = num_str.parse().map_err(|_| format!("Invalid number: {num_str}"))?;

    if num < 0.0 || !num.is_finite() {
        return Err("Memory size must be positive".to_string());
    }

    Ok((num * f64::from(multiplier)) as u64)
}

/// How alignment files are decoded, encoded and joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ToolkitArg {
    /// Run `samtools` subprocesses (SAM or BAM in, BAM out).
    Samtools,
    /// Run `sambamba` subprocesses (BAM in, or SAM with `--sam-input`; BAM out).
    Sambamba,
    /// Read and write SAM text directly.
    Text,
}

/// Ordering strategy inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InBlockSortArg {
    /// Sort every block as a whole.
    Full,
    /// Sort fixed-size sub-chunks, falling back to a full sort when they overlap.
    SubChunked,
}

/// Behaviour when joining the sorted blocks fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConcatFailureArg {
    /// Fail and keep the sorted blocks on disk.
    Error,
    /// Warn, remove the intermediate files and exit successfully.
    Warn,
}

impl From<ConcatFailureArg> for ConcatFailurePolicy {
    fn from(arg: ConcatFailureArg) -> Self {
        match arg {
            ConcatFailureArg::Error => ConcatFailurePolicy::Error,
            ConcatFailureArg::Warn => ConcatFailurePolicy::Warn,
        }
    }
}

/// Options controlling the external toolkit.
#[derive(Debug, Clone, Args)]
pub struct ToolkitOptions {
    /// Toolkit used to read and write alignment files.
    #[arg(long = "toolkit", value_enum, default_value = "samtools")]
    pub toolkit: ToolkitArg,

    /// Path to the samtools binary.
    #[arg(long = "samtools", default_value = "samtools")]
    pub samtools: PathBuf,

    /// Path to the sambamba binary.
    #[arg(long = "sambamba", default_value = "sambamba")]
    pub sambamba: PathBuf,

    /// Input is SAM text (only needed with `--toolkit sambamba`).
    #[arg(short = 'S', long = "sam-input")]
    pub sam_input: bool,

    /// Compression level for the output (0-9).
    #[arg(short = 'l', long = "compression-level", default_value_t = DEFAULT_COMPRESSION_LEVEL,
          value_parser = clap::value_parser!(u32).range(0..=9))]
    pub compression_level: u32,
}

impl ToolkitOptions {
    /// Apply the encoder settings to `config`.
    #[must_use]
    pub fn apply(&self, config: SortConfig) -> SortConfig {
        config.compression_level(self.compression_level)
    }

    /// Build the toolkit with the thread count and compression level of `config`.
    #[must_use]
    pub fn build(&self, config: &SortConfig) -> Box<dyn AlignmentToolkit> {
        match self.toolkit {
            ToolkitArg::Samtools => {
                Box::new(Samtools::from_config(config).binary(self.samtools.clone()))
            }
            ToolkitArg::Sambamba => Box::new(
                Sambamba::from_config(config)
                    .binary(self.sambamba.clone())
                    .sam_input(self.sam_input),
            ),
            ToolkitArg::Text => Box::new(PlainText),
        }
    }
}

/// Options for the memory budget and partitioning.
#[derive(Debug, Clone, Args)]
pub struct PartitionOptions {
    /// Total memory budget, split evenly across threads (e.g. "512M", "2G").
    #[arg(short = 'm', long = "max-memory", default_value = "2G", value_parser = parse_memory)]
    pub max_memory: u64,

    /// Number of worker threads; also passed to the toolkit.
    #[arg(short = '@', short_alias = 't', long = "threads", default_value = "1")]
    pub threads: usize,

    /// Width of one histogram interval in coordinate units.
    #[arg(long = "interval-width", default_value = "1000000")]
    pub interval_width: u64,

    /// Most block files kept open while partitioning; lowered to fit the
    /// process's open-file limit.
    #[arg(long = "max-open-files", default_value_t = DEFAULT_MAX_OPEN_FILES)]
    pub max_open_files: usize,
}

impl PartitionOptions {
    /// Configuration carrying these options.
    #[must_use]
    pub fn config(&self) -> SortConfig {
        SortConfig::new()
            .total_memory(self.max_memory)
            .threads(self.threads)
            .interval_width(self.interval_width)
            .max_open_files(self.max_open_files)
    }
}

/// Options for sorting inside blocks.
#[derive(Debug, Clone, Args)]
pub struct BlockSortOptions {
    /// Ordering strategy inside each block.
    #[arg(long = "in-block-sort", value_enum, default_value = "full")]
    pub in_block_sort: InBlockSortArg,

    /// Records per sub-chunk with `--in-block-sort sub-chunked`.
    #[arg(long = "sub-chunk-records", default_value_t = DEFAULT_SUB_CHUNK_RECORDS)]
    pub sub_chunk_records: usize,

    /// What to do when joining the sorted blocks fails.
    #[arg(long = "on-concat-failure", value_enum, default_value = "error")]
    pub on_concat_failure: ConcatFailureArg,

    /// Parent directory for intermediate files.
    #[arg(short = 'T', long = "tmp-dir")]
    pub tmp_dir: Option<PathBuf>,
}

impl BlockSortOptions {
    /// Apply these options to `config`.
    #[must_use]
    pub fn apply(&self, config: SortConfig) -> SortConfig {
        let strategy = match self.in_block_sort {
            InBlockSortArg::Full => InBlockSort::Full,
            InBlockSortArg::SubChunked => {
                InBlockSort::SubChunked { chunk_records: self.sub_chunk_records }
            }
        };
        let config = config.in_block_sort(strategy).concat_failure(self.on_concat_failure.into());
        match &self.tmp_dir {
            Some(dir) => config.temp_dir(dir.clone()),
            None => config,
        }
    }
}
