//! Check that a file is in global-coordinate order.

use std::io::BufRead;
use std::path::Path;

use bstr::ByteSlice;

use crate::errors::{Result, SortError};
use crate::progress::ProgressTracker;
use crate::sort::contig::{ContigIndex, GlobalCoordinate};
use crate::sort::record::{LineReader, is_header_line, record_coordinate};
use crate::toolkit::AlignmentToolkit;

/// First record found out of order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// 1-based index of the record among record lines.
    pub record_number: u64,
    /// Name (first field) of the offending record.
    pub name: String,
}

/// Outcome of a verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Record lines checked.
    pub records: u64,
    /// Records whose coordinate is below the previous record's.
    pub violations: u64,
    /// The first violation, if any.
    pub first_violation: Option<Violation>,
}

impl VerifyReport {
    /// True when no record was out of order.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.violations == 0
    }
}

/// Reads a decoded stream and counts coordinate-order violations.
///
/// Unaligned records carry the largest coordinate, so an aligned record after
/// an unaligned one counts as a violation.
#[derive(Debug, Default)]
pub struct SortVerifier;

impl SortVerifier {
    /// Verify the file at `input`, decoded with `toolkit`.
    pub fn verify_file(&self, toolkit: &dyn AlignmentToolkit, input: &Path) -> Result<VerifyReport> {
        let mut source = toolkit.decode(input)?;
        let report = self.verify(&mut source)?;
        source.finish()?;
        Ok(report)
    }

    /// Verify a decoded stream.
    pub fn verify<R: BufRead>(&self, reader: R) -> Result<VerifyReport> {
        let mut lines = LineReader::new(reader);
        let mut index = ContigIndex::new();
        let mut report = VerifyReport::default();
        let mut previous: Option<GlobalCoordinate> = None;
        let progress = ProgressTracker::new("Verified records").with_interval(1_000_000);

        while let Some((line_number, line)) = lines.next_line()? {
            if is_header_line(line) {
                if report.records > 0 {
                    return Err(SortError::MalformedHeader {
                        line: line.to_str_lossy().into_owned(),
                        reason: format!("header line {line_number} follows record lines"),
                    });
                }
                index.add_header_line(line)?;
                continue;
            }
            let coordinate = record_coordinate(line, &index, line_number)?;
            report.records += 1;
            progress.log_if_needed(1);
            if previous.is_some_and(|p| coordinate < p) {
                report.violations += 1;
                if report.first_violation.is_none() {
                    let name = line.split_str("\t").next().unwrap_or_default();
                    report.first_violation = Some(Violation {
                        record_number: report.records,
                        name: name.to_str_lossy().into_owned(),
                    });
                }
            }
            previous = Some(coordinate);
        }
        progress.log_final();
        Ok(report)
    }
}
