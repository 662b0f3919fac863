//! End-to-end sorting through the library API.

use std::path::{Path, PathBuf};

use fastsort_lib::config::{InBlockSort, SortConfig};
use fastsort_lib::sort::{BlockSorter, SortStats, SortVerifier};
use fastsort_lib::toolkit::PlainText;
use rstest::rstest;
use tempfile::TempDir;

use crate::helpers::{
    SamBuilder, assert_coordinate_sorted, assert_same_records, assert_stable, global_coordinates,
    header_lines, random_sam, record_names,
};

const CONTIGS: &[(&str, u64)] = &[("chr1", 1000), ("chr2", 2000)];

/// Sort `input` with the text toolkit, returning the output text and statistics.
fn sort_text(dir: &Path, input: &str, config: SortConfig) -> (String, SortStats) {
    let input_path = dir.join("input.sam");
    let output_path = dir.join("output.sam");
    std::fs::write(&input_path, input).unwrap();
    let config = config.temp_dir(dir.join("tmp"));
    let stats = BlockSorter::new(config, Box::new(PlainText))
        .sort(&input_path, &output_path)
        .expect("sort failed");
    (std::fs::read_to_string(&output_path).unwrap(), stats)
}

fn small_input() -> SamBuilder {
    SamBuilder::with_contigs(CONTIGS)
        .aligned("r1", "chr2", 50)
        .aligned("r2", "chr1", 900)
        .unaligned("u1", 0)
        .aligned("r3", "chr1", 10)
        .aligned("r4", "chr2", 50)
        .unaligned("u2", 7)
        .aligned("r5", "chr1", 10)
}

#[test]
fn test_three_aligned_blocks_and_one_bypass_block_with_one_thread() {
    let dir = TempDir::new().unwrap();
    let input = small_input().build();
    let config = SortConfig::new().threads(1).total_memory(100).interval_width(100);
    let (output, stats) = sort_text(dir.path(), &input, config);

    assert_eq!(stats.aligned_blocks, 3);
    assert_eq!(stats.bypass_blocks, 1);
    assert_eq!(stats.output_records, 7);
    assert_eq!(record_names(&output), vec!["r3", "r5", "r2", "r1", "r4", "u1", "u2"]);
    assert_same_records(&input, &output);
}

#[test]
fn test_contig_offsets_give_global_coordinate() {
    let dir = TempDir::new().unwrap();
    let input = SamBuilder::with_contigs(CONTIGS)
        .aligned("late", "chr2", 50)
        .aligned("early", "chr1", 999)
        .aligned("later", "chr2", 51)
        .build();
    let (output, _) = sort_text(dir.path(), &input, SortConfig::new());
    assert_eq!(record_names(&output), vec!["early", "late", "later"]);
    assert_eq!(global_coordinates(&output), vec![999, 1050, 1051]);
}

#[test]
fn test_unaligned_records_sort_last_whatever_their_position() {
    let dir = TempDir::new().unwrap();
    let input = SamBuilder::with_contigs(CONTIGS)
        .unaligned("u_low", 1)
        .aligned("a", "chr2", 1999)
        .unaligned("u_high", 1_000_000)
        .aligned("b", "chr1", 1)
        .build();
    let (output, _) = sort_text(dir.path(), &input, SortConfig::new().interval_width(10));
    assert_eq!(record_names(&output), vec!["b", "a", "u_low", "u_high"]);
}

#[rstest]
#[case::single_block(SortConfig::new())]
#[case::many_small_blocks(SortConfig::new().total_memory(2_000).threads(4).interval_width(50))]
#[case::one_bucket_per_block(SortConfig::new().total_memory(64).threads(2).interval_width(1))]
#[case::sub_chunked(
    SortConfig::new()
        .total_memory(4_000)
        .threads(3)
        .interval_width(100)
        .in_block_sort(InBlockSort::SubChunked { chunk_records: 7 })
)]
fn test_random_input_sorted_stable_and_complete(#[case] config: SortConfig) {
    let dir = TempDir::new().unwrap();
    let input = random_sam(CONTIGS, 500, 42).build();
    let (output, stats) = sort_text(dir.path(), &input, config);

    assert_coordinate_sorted(&output);
    assert_stable(&output);
    assert_same_records(&input, &output);
    assert_eq!(stats.total_records, 500);
    assert_eq!(stats.output_records, 500);
    assert_eq!(header_lines(&output), header_lines(&input));
}

#[test]
fn test_block_layout_does_not_change_output() {
    let input = random_sam(CONTIGS, 300, 7).build();
    let dir = TempDir::new().unwrap();
    let (reference, _) = sort_text(dir.path(), &input, SortConfig::new());
    for (memory, threads, width) in [(500, 1, 10), (3_000, 3, 100), (10_000, 8, 1_000)] {
        let dir = TempDir::new().unwrap();
        let config = SortConfig::new().total_memory(memory).threads(threads).interval_width(width);
        let (output, _) = sort_text(dir.path(), &input, config);
        assert_eq!(output, reference, "memory={memory} threads={threads} width={width}");
    }
}

#[test]
fn test_sorting_sorted_input_keeps_record_order() {
    let dir = TempDir::new().unwrap();
    let input = random_sam(CONTIGS, 200, 3).build();
    let (once, _) = sort_text(dir.path(), &input, SortConfig::new().total_memory(1_000));

    let dir = TempDir::new().unwrap();
    let (twice, _) =
        sort_text(dir.path(), &once, SortConfig::new().total_memory(3_000).threads(2));
    assert_eq!(record_names(&once), record_names(&twice));
}

#[test]
fn test_aligned_blocks_stay_within_budget() {
    let dir = TempDir::new().unwrap();
    let input_path: PathBuf = dir.path().join("input.sam");
    random_sam(CONTIGS, 1_000, 11).write(&input_path);

    let sorter = BlockSorter::new(
        SortConfig::new().total_memory(4_000).threads(2).interval_width(20),
        Box::new(PlainText),
    );
    let scan = sorter.scan(&input_path).unwrap();
    let plan = sorter.plan(&scan);

    assert_eq!(plan.total_lines(), 1_000);
    for block in plan.blocks().iter().filter(|b| !b.is_bypass()) {
        assert!(block.oversized || block.bytes <= 2_000, "block {} has {} bytes", block.id, block.bytes);
    }
    let first_bypass = plan.blocks().iter().position(|b| b.is_bypass());
    if let Some(first) = first_bypass {
        assert!(plan.blocks()[first..].iter().all(|b| b.is_bypass()));
    }
}

#[test]
fn test_oversized_interval_is_accepted() {
    let dir = TempDir::new().unwrap();
    let mut builder = SamBuilder::with_contigs(CONTIGS);
    for i in 0..20 {
        builder = builder.aligned(&format!("read{i}"), "chr1", 500);
    }
    let input = builder.aligned("read20", "chr1", 10).build();
    let (output, stats) = sort_text(dir.path(), &input, SortConfig::new().total_memory(200));

    assert!(stats.oversized_blocks >= 1);
    assert_eq!(record_names(&output)[0], "read20");
    assert_stable(&output);
}

#[test]
fn test_header_only_input_gives_header_only_output() {
    let dir = TempDir::new().unwrap();
    let input = SamBuilder::with_contigs(CONTIGS).header_line("@PG\tID:aligner").build();
    let (output, stats) = sort_text(dir.path(), &input, SortConfig::new());
    assert_eq!(output, input);
    assert_eq!(stats.total_records, 0);
    assert_eq!(stats.aligned_blocks + stats.bypass_blocks, 0);
}

#[test]
fn test_crlf_input_is_written_with_lf_endings() {
    let dir = TempDir::new().unwrap();
    let input = small_input().header_line("@PG\tID:aligner").build();
    let (expected, _) = sort_text(dir.path(), &input, SortConfig::new());

    let crlf_dir = TempDir::new().unwrap();
    let crlf = input.replace('\n', "\r\n");
    let (output, stats) = sort_text(crlf_dir.path(), &crlf, SortConfig::new());
    assert!(!output.contains('\r'));
    assert_eq!(output, expected);
    assert_eq!(stats.header_lines, header_lines(&input).len() as u64);
}

#[test]
fn test_scratch_directory_is_removed() {
    let dir = TempDir::new().unwrap();
    let input = random_sam(CONTIGS, 100, 5).build();
    sort_text(dir.path(), &input, SortConfig::new().total_memory(500).threads(2));
    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("tmp")).unwrap().collect();
    assert!(leftovers.is_empty(), "scratch left behind: {leftovers:?}");
}

#[test]
fn test_verifier_accepts_sorted_output_and_rejects_input() {
    let dir = TempDir::new().unwrap();
    let input = small_input().build();
    let (output, _) = sort_text(dir.path(), &input, SortConfig::new());

    let sorted = SortVerifier.verify(output.as_bytes()).unwrap();
    assert!(sorted.is_sorted());
    assert_eq!(sorted.records, 7);

    let unsorted = SortVerifier.verify(input.as_bytes()).unwrap();
    assert!(!unsorted.is_sorted());
    assert_eq!(unsorted.first_violation.unwrap().name, "r2");
}
