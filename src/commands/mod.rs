//! CLI command implementations for fastsort.
//!
//! - [`sort`] - sort a file by coordinate, or verify that it is sorted
//! - [`plan`] - scan a file and report the block plan without sorting

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate, clippy::uninlined_format_args)]

pub mod command;
pub mod common;
pub mod plan;
pub mod sort;
