//! End-to-end coordinate sort: scan, plan, partition, sort blocks, reassemble.

use std::path::Path;

use log::info;
use tempfile::TempDir;

use crate::config::SortConfig;
use crate::errors::Result;
use crate::logging::{OperationTimer, format_bytes, log_plan_summary};
use crate::sort::block::InBlockOutcome;
use crate::sort::histogram::{HistogramScanner, ScanResult};
use crate::sort::partitioner::Partitioner;
use crate::sort::planner::{PartitionPlan, PartitionPlanner};
use crate::sort::pool::BlockSortWorkerPool;
use crate::sort::reassemble::{ReassemblyOutcome, Reassembler};
use crate::toolkit::AlignmentToolkit;
use crate::validation::{validate_distinct_paths, validate_input_path};

/// Statistics from a sort run.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct SortStats {
    /// Header lines copied to the output.
    pub header_lines: u64,
    /// Record lines read from the input.
    pub total_records: u64,
    /// Record lines written to sorted blocks.
    pub output_records: u64,
    /// Aligned blocks sorted.
    pub aligned_blocks: usize,
    /// Bypass blocks copied through.
    pub bypass_blocks: usize,
    /// Blocks larger than the per-thread budget.
    pub oversized_blocks: usize,
    /// Aligned blocks where sub-chunk sorting fell back to a full sort.
    pub sub_chunk_fallbacks: usize,
    /// True if the final concatenation failed and the run carried on.
    pub concatenation_failed: bool,
}

/// Two-pass, block-parallel coordinate sorter.
pub struct BlockSorter {
    config: SortConfig,
    toolkit: Box<dyn AlignmentToolkit>,
}

impl BlockSorter {
    /// Sorter with `config`, reading and writing through `toolkit`.
    #[must_use]
    pub fn new(config: SortConfig, toolkit: Box<dyn AlignmentToolkit>) -> Self {
        Self { config, toolkit }
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    /// First pass over `input`: header, contig index and volume histogram.
    pub fn scan(&self, input: &Path) -> Result<ScanResult> {
        let mut source = self.toolkit.decode(input)?;
        let scan = HistogramScanner::new(&self.config).scan(&mut source)?;
        source.finish()?;
        Ok(scan)
    }

    /// Pack the scanned histogram into blocks within the per-thread budget.
    #[must_use]
    pub fn plan(&self, scan: &ScanResult) -> PartitionPlan {
        PartitionPlanner::new(self.config.per_thread_memory()).plan(&scan.histogram)
    }

    /// Sort `input` by global coordinate into `output`.
    pub fn sort(&self, input: &Path, output: &Path) -> Result<SortStats> {
        self.config.validate()?;
        validate_input_path(input)?;
        validate_distinct_paths(input, output)?;

        info!("Toolkit: {}", self.toolkit.name());
        info!(
            "Memory: {} total, {} per thread across {} threads",
            format_bytes(self.config.total_memory),
            format_bytes(self.config.per_thread_memory()),
            self.config.threads
        );

        let scratch = self.create_temp_dir()?;
        let mut stats = SortStats::default();

        let timer = OperationTimer::new("Scanning input");
        let scan = self.scan(input)?;
        timer.log_completion(scan.records);
        stats.header_lines = scan.header.len() as u64;
        stats.total_records = scan.records;

        let plan = self.plan(&scan);
        log_plan_summary(&plan);
        stats.aligned_blocks = plan.aligned_block_count();
        stats.bypass_blocks = plan.bypass_block_count();
        stats.oversized_blocks = plan.oversized_block_count();

        let timer = OperationTimer::new("Partitioning input");
        let mut source = self.toolkit.decode(input)?;
        let partitioned = Partitioner::new(&scan, &plan, scratch.path())
            .max_open_files(self.config.effective_open_files())
            .buffer_memory(self.config.total_memory)
            .partition(&mut source)?;
        source.finish()?;
        timer.log_completion(plan.total_lines());

        let timer = OperationTimer::new("Sorting blocks");
        let pool = BlockSortWorkerPool::new(
            &self.config,
            self.toolkit.as_ref(),
            &scan.header,
            &scan.index,
            scratch.path(),
        );
        let sorted = pool.run(&partitioned)?;
        timer.log_completion(sorted.len() as u64);
        stats.output_records = sorted.iter().map(|b| b.records).sum();
        stats.sub_chunk_fallbacks = sorted
            .iter()
            .filter(|b| b.outcome == Some(InBlockOutcome::FellBackToFull))
            .count();

        let timer = OperationTimer::new("Reassembling output");
        let reassembler =
            Reassembler::new(self.toolkit.as_ref(), &scan.header, self.config.concat_failure);
        let outcome = reassembler.reassemble(&sorted, output, scratch)?;
        timer.log_completion(stats.output_records);
        stats.concatenation_failed =
            matches!(outcome, ReassemblyOutcome::ConcatenationFailed { .. });

        Ok(stats)
    }

    fn create_temp_dir(&self) -> Result<TempDir> {
        let dir = match &self.config.temp_dir {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                tempfile::Builder::new().prefix("fastsort.").tempdir_in(base)?
            }
            None => tempfile::Builder::new().prefix("fastsort.").tempdir()?,
        };
        info!("Scratch directory: {}", dir.path().display());
        Ok(dir)
    }
}

impl std::fmt::Debug for BlockSorter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockSorter")
            .field("config", &self.config)
            .field("toolkit", &self.toolkit.name())
            .finish()
    }
}
