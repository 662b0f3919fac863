//! Sort an alignment file by global coordinate.
//!
//! # Verification
//!
//! Use `--verify` to check whether a file is already in coordinate order
//! without writing output.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;

use fastsort_lib::config::SortConfig;
use fastsort_lib::logging::{OperationTimer, format_count, log_sort_summary};
use fastsort_lib::sort::{BlockSorter, SortVerifier};
use fastsort_lib::validation::validate_file_exists;

use crate::commands::command::Command;
use crate::commands::common::{BlockSortOptions, PartitionOptions, ToolkitOptions};

/// Sort an alignment file by coordinate.
#[derive(Debug, Parser)]
#[command(
    name = "sort",
    about = "Sort a SAM/BAM file by coordinate with a fixed memory budget",
    long_about = r#"
Sort a SAM/BAM file by coordinate in two passes over the input.

The first pass measures how much data falls into each coordinate interval.
Adjacent intervals are then packed into blocks that fit the per-thread memory
budget (--max-memory divided by --threads). The second pass splits the input
into those blocks, worker threads sort the blocks in parallel, and the sorted
blocks are concatenated in order. Unaligned records are placed last, in their
input order.

Records on the same coordinate keep their input order. Header lines are copied
unchanged.

EXAMPLES:

  # Sort a BAM with 8 threads and 16G of memory
  fastsort sort -i input.bam -o sorted.bam -@ 8 -m 16G

  # Sort SAM text without samtools
  fastsort sort -i input.sam -o sorted.sam --toolkit text

  # Check that a file is sorted
  fastsort sort -i sorted.bam --verify
"#
)]
pub struct Sort {
    /// Input SAM/BAM file. Standard input is not supported.
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output file [default: <input>.sorted].
    #[arg(short = 'o', long = "output", conflicts_with = "verify")]
    pub output: Option<PathBuf>,

    /// Check that the input is sorted by coordinate instead of sorting it.
    ///
    /// Exits non-zero if any record is out of order.
    #[arg(long = "verify", conflicts_with = "output")]
    pub verify: bool,

    #[command(flatten)]
    pub partition: PartitionOptions,

    #[command(flatten)]
    pub block_sort: BlockSortOptions,

    #[command(flatten)]
    pub toolkit: ToolkitOptions,
}

/// Default output path: the input path with `.sorted` appended.
fn default_output(input: &Path) -> PathBuf {
    let mut path = OsString::from(input.as_os_str());
    path.push(".sorted");
    PathBuf::from(path)
}

impl Command for Sort {
    fn execute(&self) -> Result<()> {
        validate_file_exists(&self.input, "Input")?;

        if self.verify {
            return self.execute_verify();
        }
        self.execute_sort()
    }
}

impl Sort {
    /// Configuration assembled from every option group.
    fn config(&self) -> SortConfig {
        self.toolkit.apply(self.block_sort.apply(self.partition.config()))
    }

    /// Output path for sort mode.
    fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| default_output(&self.input))
    }

    fn execute_sort(&self) -> Result<()> {
        let output = self.output_path();
        let config = self.config();
        let toolkit = self.toolkit.build(&config);

        let timer = OperationTimer::new("Sorting");
        info!("Starting Sort");
        info!("Input: {}", self.input.display());
        info!("Output: {}", output.display());
        info!("Threads: {}", config.threads);
        info!("In-block sort: {:?}", config.in_block_sort);
        if let Some(ref tmp) = config.temp_dir {
            info!("Temp directory: {}", tmp.display());
        }

        let sorter = BlockSorter::new(config, toolkit);
        let stats = sorter
            .sort(&self.input, &output)
            .with_context(|| format!("Failed to sort {}", self.input.display()))?;

        log_sort_summary(&stats);
        info!("Output: {}", output.display());
        timer.log_completion(stats.output_records);
        Ok(())
    }

    /// Execute verify mode: read records and check coordinate order.
    fn execute_verify(&self) -> Result<()> {
        let toolkit = self.toolkit.build(&self.config());

        let timer = OperationTimer::new("Verifying sort order");
        info!("Starting Sort Verification");
        info!("Input: {}", self.input.display());

        let report = SortVerifier
            .verify_file(toolkit.as_ref(), &self.input)
            .with_context(|| format!("Failed to verify {}", self.input.display()))?;

        info!("=== Verification Summary ===");
        info!("Records checked: {}", format_count(report.records));
        info!("Sort order violations: {}", format_count(report.violations));
        timer.log_completion(report.records);

        if let Some(violation) = &report.first_violation {
            info!("First violation at record {}: {}", violation.record_number, violation.name);
        }
        if !report.is_sorted() {
            bail!(
                "{} is NOT sorted by coordinate: {} violations found",
                self.input.display(),
                report.violations
            );
        }

        info!("Result: PASS - file is sorted by coordinate");
        Ok(())
    }
}
