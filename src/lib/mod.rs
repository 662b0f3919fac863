#![deny(unsafe_code)]
// Clippy lint configuration for CI
// - cast_*: coordinates, byte counts and record counts move between u64 and usize
// - missing_*_doc: error and panic sections are not written for every fn
// - needless_pass_by_value: some APIs take ownership on purpose
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value,
    clippy::items_after_statements,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args
)]

//! # fastsort - block-parallel coordinate sorting of alignment files
//!
//! Sorts SAM/BAM files by coordinate in two passes over the input and with a
//! fixed memory budget, without the merge phase of an external sort.
//!
//! ## Overview
//!
//! - **[`sort`]** - the sorting engine: contig index, volume histogram,
//!   partition plan, partitioner, worker pool and reassembly
//! - **[`toolkit`]** - decoding, encoding and concatenation of alignment files
//!   through an external toolkit (`samtools`) or as plain SAM text
//! - **[`config`]** - run configuration
//! - **[`errors`]** - structured error types
//! - **[`validation`]** - input path checks
//! - **[`progress`]** and **[`logging`]** - progress reporting and formatting
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use fastsort_lib::config::SortConfig;
//! use fastsort_lib::sort::BlockSorter;
//! use fastsort_lib::toolkit::Samtools;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = SortConfig::new().threads(8).total_memory(8 * 1024 * 1024 * 1024);
//! let toolkit = Samtools::from_config(&config);
//! let sorter = BlockSorter::new(config, Box::new(toolkit));
//! let stats = sorter.sort(Path::new("input.bam"), Path::new("sorted.bam"))?;
//! println!("sorted {} records", stats.output_records);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod logging;
pub mod progress;
pub mod sort;
pub mod toolkit;
pub mod validation;
