//! Integration tests for fastsort.
//!
//! These tests run the whole engine on SAM text written to temporary
//! directories, mostly through the plain-text toolkit.

mod helpers;
mod test_cli;
mod test_error_paths;
mod test_samtools;
mod test_sort_pipeline;
