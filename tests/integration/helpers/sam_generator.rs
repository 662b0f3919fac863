//! Builders for SAM text inputs.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Builds a SAM file line by line.
#[derive(Debug, Default, Clone)]
pub struct SamBuilder {
    header: Vec<String>,
    records: Vec<String>,
}

impl SamBuilder {
    /// Builder with an `@HD` line and one `@SQ` line per contig.
    pub fn with_contigs(contigs: &[(&str, u64)]) -> Self {
        let mut builder = Self::default();
        builder.header.push("@HD\tVN:1.6\tSO:unsorted".to_string());
        for (name, length) in contigs {
            builder.header.push(format!("@SQ\tSN:{name}\tLN:{length}"));
        }
        builder
    }

    /// Append a raw header line.
    pub fn header_line(mut self, line: &str) -> Self {
        self.header.push(line.to_string());
        self
    }

    /// Append an aligned record.
    pub fn aligned(mut self, name: &str, contig: &str, position: u64) -> Self {
        self.records.push(format!("{name}\t0\t{contig}\t{position}\t60\t4M\t*\t0\t0\tACGT\tIIII"));
        self
    }

    /// Append an unaligned record; `position` is carried but ignored by sorting.
    pub fn unaligned(mut self, name: &str, position: u64) -> Self {
        self.records.push(format!("{name}\t4\t*\t{position}\t0\t*\t*\t0\t0\tACGT\tIIII"));
        self
    }

    /// Append a raw record line.
    pub fn raw(mut self, line: &str) -> Self {
        self.records.push(line.to_string());
        self
    }

    /// Number of record lines.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// The SAM text.
    pub fn build(&self) -> String {
        let mut text = String::new();
        for line in self.header.iter().chain(&self.records) {
            writeln!(text, "{line}").unwrap();
        }
        text
    }

    /// Write the SAM text to `path`.
    pub fn write(&self, path: &Path) {
        std::fs::write(path, self.build()).expect("Failed to write SAM");
    }
}

/// Random records over `contigs`, with about one in ten unaligned.
///
/// Names are `read{i}` in input order so that stability can be checked.
pub fn random_sam(contigs: &[(&str, u64)], records: usize, seed: u64) -> SamBuilder {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut builder = SamBuilder::with_contigs(contigs);
    for i in 0..records {
        let name = format!("read{i}");
        if rng.random_range(0..10) == 0 {
            builder = builder.unaligned(&name, rng.random_range(0..100));
        } else {
            let (contig, length) = contigs[rng.random_range(0..contigs.len())];
            // Narrow position range so that ties are common.
            let position = rng.random_range(1..=length.min(50));
            builder = builder.aligned(&name, contig, position * (length / 50).max(1));
        }
    }
    builder
}
