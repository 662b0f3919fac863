//! Round trips through a real `samtools` binary.

use std::process::Command;

use fastsort_lib::config::SortConfig;
use fastsort_lib::sort::{BlockSorter, SortVerifier};
use fastsort_lib::toolkit::Samtools;
use tempfile::TempDir;

use crate::helpers::{assert_coordinate_sorted, assert_same_records, random_sam};

/// Check if samtools is available in PATH.
fn samtools_available() -> bool {
    Command::new("samtools").arg("--version").output().map(|o| o.status.success()).unwrap_or(false)
}

fn samtools_view(path: &std::path::Path) -> String {
    let output = Command::new("samtools")
        .args(["view", "-h", path.to_str().unwrap()])
        .output()
        .expect("Failed to run samtools view");
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap()
}

#[test]
#[ignore = "requires samtools"]
fn test_sam_in_bam_out() {
    if !samtools_available() {
        eprintln!("Skipping: samtools not available");
        return;
    }
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.sam");
    let output = dir.path().join("output.bam");
    let sam = random_sam(&[("chr1", 10_000), ("chr2", 5_000)], 2_000, 17);
    sam.write(&input);

    let config = SortConfig::new().threads(4).total_memory(40_000).interval_width(500);
    let stats = BlockSorter::new(config, Box::new(Samtools::new().threads(4)))
        .sort(&input, &output)
        .unwrap();
    assert!(stats.aligned_blocks > 1);

    let sorted = samtools_view(&output);
    assert_coordinate_sorted(&sorted);
    assert_same_records(&sam.build(), &sorted);

    let report = SortVerifier.verify_file(&Samtools::new(), &output).unwrap();
    assert!(report.is_sorted());
    assert_eq!(report.records, 2_000);
}
