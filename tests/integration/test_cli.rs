//! Tests that drive the `fastsort` binary.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

use crate::helpers::{SamBuilder, assert_coordinate_sorted, assert_same_records, random_sam};

const CONTIGS: &[(&str, u64)] = &[("chr1", 1000), ("chr2", 2000)];

fn fastsort(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fastsort"))
        .args(args)
        .output()
        .expect("Failed to run fastsort")
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_sort_command_with_text_toolkit() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    let output = dir.path().join("output.sam");
    let sam = random_sam(CONTIGS, 200, 99);
    sam.write(&input);

    let result = fastsort(&[
        "sort",
        "-i",
        path_str(&input),
        "-o",
        path_str(&output),
        "--toolkit",
        "text",
        "-@",
        "3",
        "-m",
        "6K",
        "--interval-width",
        "100",
        "-T",
        path_str(dir.path()),
    ]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let sorted = std::fs::read_to_string(&output).unwrap();
    assert_coordinate_sorted(&sorted);
    assert_same_records(&sam.build(), &sorted);
}

/// Run `fastsort` under a shell that first lowers the open-file limit.
#[cfg(unix)]
fn fastsort_with_file_limit(limit: u32, args: &[&str]) -> Output {
    Command::new("sh")
        .arg("-c")
        .arg(format!("ulimit -n {limit} && exec \"$0\" \"$@\""))
        .arg(env!("CARGO_BIN_EXE_fastsort"))
        .args(args)
        .output()
        .expect("Failed to run fastsort under sh")
}

#[cfg(unix)]
#[test]
fn test_sort_with_more_blocks_than_file_limit() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    let output = dir.path().join("output.sam");
    // One record per 30-unit interval, written in reverse: about 3,000 blocks.
    let mut sam = SamBuilder::with_contigs(&[("chr1", 90_000)]);
    for i in (0..3_000u64).rev() {
        sam = sam.aligned(&format!("r{i}"), "chr1", i * 30 + 1);
    }
    sam.write(&input);

    let result = fastsort_with_file_limit(
        64,
        &[
            "sort",
            "-i",
            path_str(&input),
            "-o",
            path_str(&output),
            "--toolkit",
            "text",
            "-m",
            "60",
            "--interval-width",
            "30",
            "-T",
            path_str(dir.path()),
        ],
    );
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let sorted = std::fs::read_to_string(&output).unwrap();
    assert_coordinate_sorted(&sorted);
    assert_same_records(&sam.build(), &sorted);
}

#[test]
fn test_sort_command_default_output_path() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    SamBuilder::with_contigs(CONTIGS).aligned("b", "chr2", 1).aligned("a", "chr1", 1).write(&input);

    let result = fastsort(&["sort", "-i", path_str(&input), "--toolkit", "text"]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));
    assert!(dir.path().join("input.sam.sorted").exists());
}

#[test]
fn test_verify_command() {
    let dir = TempDir::new().unwrap();
    let sorted = dir.path().join("sorted.sam");
    let unsorted = dir.path().join("unsorted.sam");
    SamBuilder::with_contigs(CONTIGS).aligned("a", "chr1", 1).aligned("b", "chr2", 1).write(&sorted);
    SamBuilder::with_contigs(CONTIGS).aligned("b", "chr2", 1).aligned("a", "chr1", 1).write(&unsorted);

    let pass = fastsort(&["sort", "-i", path_str(&sorted), "--verify", "--toolkit", "text"]);
    assert!(pass.status.success(), "{}", String::from_utf8_lossy(&pass.stderr));

    let fail = fastsort(&["sort", "-i", path_str(&unsorted), "--verify", "--toolkit", "text"]);
    assert!(!fail.status.success());
    assert!(String::from_utf8_lossy(&fail.stderr).contains("NOT sorted"));
}

#[test]
fn test_plan_command_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    random_sam(CONTIGS, 50, 1).write(&input);

    let result = fastsort(&["plan", "-i", path_str(&input), "--toolkit", "text", "-m", "1K"]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));
    assert!(String::from_utf8_lossy(&result.stderr).contains("Planned"));
    let entries = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn test_missing_input_fails() {
    let dir = TempDir::new().unwrap();
    let result = fastsort(&["sort", "-i", path_str(&dir.path().join("nope.sam")), "--toolkit", "text"]);
    assert!(!result.status.success());
}

#[test]
fn test_stdin_input_fails() {
    let result = fastsort(&["plan", "-i", "-", "--toolkit", "text"]);
    assert!(!result.status.success());
}

#[test]
fn test_invalid_memory_rejected_by_parser() {
    let result = fastsort(&["sort", "-i", "in.sam", "-m", "lots"]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("Invalid number"));
}
