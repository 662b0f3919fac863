//! Assertions over sorted SAM text.

#![allow(dead_code)]

use std::collections::HashMap;

/// Record lines of a SAM text.
pub fn record_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|l| !l.is_empty() && !l.starts_with('@')).collect()
}

/// Header lines of a SAM text.
pub fn header_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|l| l.starts_with('@')).collect()
}

/// Read names of the record lines, in order.
pub fn record_names(text: &str) -> Vec<&str> {
    record_lines(text).iter().map(|l| l.split('\t').next().unwrap()).collect()
}

/// Global coordinate of every record, `u64::MAX` for unaligned records.
pub fn global_coordinates(text: &str) -> Vec<u64> {
    let mut offsets = HashMap::new();
    let mut total = 0;
    for line in header_lines(text) {
        if !line.starts_with("@SQ") {
            continue;
        }
        let name = line.split('\t').find_map(|f| f.strip_prefix("SN:")).unwrap();
        let length: u64 = line.split('\t').find_map(|f| f.strip_prefix("LN:")).unwrap().parse().unwrap();
        offsets.insert(name.to_string(), total);
        total += length;
    }
    record_lines(text)
        .iter()
        .map(|l| {
            let fields: Vec<&str> = l.split('\t').collect();
            if fields[2] == "*" {
                u64::MAX
            } else {
                offsets[fields[2]] + fields[3].parse::<u64>().unwrap()
            }
        })
        .collect()
}

/// Asserts that records never go down in global coordinate.
///
/// # Panics
///
/// Panics at the first decrease.
pub fn assert_coordinate_sorted(text: &str) {
    let coordinates = global_coordinates(text);
    for (i, pair) in coordinates.windows(2).enumerate() {
        assert!(pair[0] <= pair[1], "record {} ({}) sorts after record {} ({})", i, pair[0], i + 1, pair[1]);
    }
}

/// Asserts that records sharing a coordinate keep input order.
///
/// Record names must be `read{i}` with `i` the input index.
pub fn assert_stable(text: &str) {
    let coordinates = global_coordinates(text);
    let indices: Vec<usize> = record_names(text)
        .iter()
        .map(|n| n.trim_start_matches("read").parse().unwrap())
        .collect();
    for i in 1..indices.len() {
        if coordinates[i] == coordinates[i - 1] {
            assert!(
                indices[i - 1] < indices[i],
                "read{} and read{} share coordinate {} but were reordered",
                indices[i - 1],
                indices[i],
                coordinates[i]
            );
        }
    }
}

/// Asserts that `output` holds exactly the record lines of `input`.
pub fn assert_same_records(input: &str, output: &str) {
    let mut expected = record_lines(input);
    let mut actual = record_lines(output);
    expected.sort_unstable();
    actual.sort_unstable();
    assert_eq!(expected, actual, "records were dropped or duplicated");
}
