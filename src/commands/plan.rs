//! Dry run: scan the input and show the partition plan without sorting.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use fastsort_lib::logging::{OperationTimer, format_count, log_block_table, log_plan_summary};
use fastsort_lib::sort::BlockSorter;
use fastsort_lib::validation::validate_input_path;

use crate::commands::command::Command;
use crate::commands::common::{PartitionOptions, ToolkitOptions};

/// Show how an input would be partitioned into blocks.
#[derive(Debug, Parser)]
#[command(
    name = "plan",
    about = "Scan a SAM/BAM file and report the block plan a sort would use"
)]
pub struct Plan {
    /// Input SAM/BAM file.
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    #[command(flatten)]
    pub partition: PartitionOptions,

    #[command(flatten)]
    pub toolkit: ToolkitOptions,
}

impl Command for Plan {
    fn execute(&self) -> Result<()> {
        validate_input_path(&self.input)?;
        let config = self.toolkit.apply(self.partition.config());
        config.validate()?;

        let toolkit = self.toolkit.build(&config);
        let sorter = BlockSorter::new(config, toolkit);
        let timer = OperationTimer::new("Scanning input");
        let scan = sorter
            .scan(&self.input)
            .with_context(|| format!("Failed to scan {}", self.input.display()))?;
        timer.log_completion(scan.records);

        info!("Contigs: {}", format_count(scan.index.len() as u64));
        info!("Header lines: {}", format_count(scan.header.len() as u64));

        let plan = sorter.plan(&scan);
        log_plan_summary(&plan);
        log_block_table(&plan, log::Level::Info);
        Ok(())
    }
}
