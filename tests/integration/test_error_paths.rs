//! Error path integration tests.
//!
//! These tests check that bad inputs and bad parameters stop a run with the
//! right error and leave no output behind.

use std::path::Path;

use fastsort_lib::config::SortConfig;
use fastsort_lib::errors::SortError;
use fastsort_lib::sort::BlockSorter;
use fastsort_lib::toolkit::{PlainText, Samtools};
use rstest::rstest;
use tempfile::TempDir;

use crate::helpers::SamBuilder;

fn sort_file(dir: &Path, input: &str) -> Result<(), SortError> {
    let input_path = dir.join("input.sam");
    std::fs::write(&input_path, input).unwrap();
    let config = SortConfig::new().temp_dir(dir.join("tmp"));
    BlockSorter::new(config, Box::new(PlainText))
        .sort(&input_path, &dir.join("output.sam"))
        .map(|_| ())
}

// ==================== Header Errors ====================

#[rstest]
#[case::missing_length("@SQ\tSN:chr1\n")]
#[case::empty_name("@SQ\tSN:\tLN:100\n")]
#[case::non_numeric_length("@SQ\tSN:chr1\tLN:abc\n")]
#[case::duplicate_contig("@SQ\tSN:chr1\tLN:100\n@SQ\tSN:chr1\tLN:200\n")]
fn test_malformed_header_is_fatal(#[case] header: &str) {
    let dir = TempDir::new().unwrap();
    let input = format!("@HD\tVN:1.6\n{header}r1\t0\tchr1\t5\t60\t4M\t*\t0\t0\tACGT\tIIII\n");
    let result = sort_file(dir.path(), &input);
    assert!(matches!(result, Err(SortError::MalformedHeader { .. })), "got {result:?}");
    assert!(!dir.path().join("output.sam").exists());
}

// ==================== Record Errors ====================

#[rstest]
#[case::too_few_fields("r1\t0\tchr1\n")]
#[case::non_numeric_position("r1\t0\tchr1\tfive\t60\n")]
#[case::negative_position("r1\t0\tchr1\t-5\t60\n")]
fn test_malformed_record_is_fatal(#[case] record: &str) {
    let dir = TempDir::new().unwrap();
    let input = format!("{}{record}", SamBuilder::with_contigs(&[("chr1", 100)]).build());
    let result = sort_file(dir.path(), &input);
    assert!(matches!(result, Err(SortError::MalformedRecord { .. })), "got {result:?}");
}

#[test]
fn test_undeclared_reference_is_fatal() {
    let dir = TempDir::new().unwrap();
    let input = SamBuilder::with_contigs(&[("chr1", 100)]).aligned("r1", "chrUn", 5).build();
    match sort_file(dir.path(), &input) {
        Err(SortError::UnknownReference { name }) => assert_eq!(name, "chrUn"),
        other => panic!("expected UnknownReference, got {other:?}"),
    }
}

// ==================== Parameter Errors ====================

#[rstest]
#[case::zero_threads(SortConfig::new().threads(0), "threads")]
#[case::zero_memory(SortConfig::new().total_memory(0), "memory")]
#[case::memory_below_threads(SortConfig::new().total_memory(3).threads(4), "memory")]
#[case::zero_interval(SortConfig::new().interval_width(0), "interval-width")]
fn test_invalid_config_rejected(#[case] config: SortConfig, #[case] parameter: &str) {
    match config.validate() {
        Err(SortError::InvalidParameter { parameter: p, .. }) => assert_eq!(p, parameter),
        other => panic!("expected InvalidParameter, got {other:?}"),
    }
}

#[test]
fn test_stdin_input_rejected() {
    let dir = TempDir::new().unwrap();
    let result = BlockSorter::new(SortConfig::new(), Box::new(PlainText))
        .sort(Path::new("-"), &dir.path().join("out.sam"));
    assert!(matches!(result, Err(SortError::InvalidParameter { .. })));
}

#[test]
fn test_output_equal_to_input_rejected() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    SamBuilder::with_contigs(&[("chr1", 100)]).aligned("r1", "chr1", 5).write(&input);
    let result = BlockSorter::new(SortConfig::new(), Box::new(PlainText)).sort(&input, &input);
    assert!(matches!(result, Err(SortError::InvalidParameter { .. })));
    assert!(std::fs::read_to_string(&input).unwrap().contains("r1\t0\tchr1\t5"));
}

#[test]
fn test_missing_input_rejected() {
    let dir = TempDir::new().unwrap();
    let result = BlockSorter::new(SortConfig::new(), Box::new(PlainText))
        .sort(&dir.path().join("missing.sam"), &dir.path().join("out.sam"));
    assert!(matches!(result, Err(SortError::InvalidFileFormat { .. })));
}

#[test]
fn test_missing_toolkit_binary_is_invocation_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    SamBuilder::with_contigs(&[("chr1", 100)]).aligned("r1", "chr1", 5).write(&input);
    let toolkit = Samtools::new().binary(dir.path().join("no-such-samtools"));
    let result = BlockSorter::new(SortConfig::new().temp_dir(dir.path().join("tmp")), Box::new(toolkit))
        .sort(&input, &dir.path().join("out.bam"));
    assert!(matches!(result, Err(SortError::ToolInvocation { .. })), "got {result:?}");
}
