//! In-memory sort of one aligned block.
//!
//! A [`BlockArena`] owns the raw bytes of a single block file. Records are
//! indexed as spans into those bytes and sorted by `(coordinate, arrival)`;
//! payloads are never copied after the initial read. A worker keeps one arena
//! and reuses its allocation from block to block.

use std::io::{Read, Write};

use log::warn;
use memchr::memchr_iter;

use crate::config::InBlockSort;
use crate::errors::Result;
use crate::sort::contig::ContigIndex;
use crate::sort::record::{AlignmentRecord, record_coordinate, trim_line_ending};

/// How the records of a block ended up ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InBlockOutcome {
    /// One sort over the whole block.
    Full,
    /// Independently sorted sub-chunks whose boundaries were already ordered.
    SubChunked,
    /// Sub-chunks overlapped, so the block was sorted as a whole instead.
    FellBackToFull,
}

/// Raw bytes of one block and the records indexed from them.
#[derive(Debug, Default)]
pub struct BlockArena {
    data: Vec<u8>,
    records: Vec<AlignmentRecord>,
}

impl BlockArena {
    /// Empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the previous block and read a new one, reserving `expected_bytes`.
    ///
    /// Every non-empty line must be a record line. Returns the record count.
    pub fn load<R: Read>(
        &mut self,
        mut reader: R,
        expected_bytes: u64,
        index: &ContigIndex,
    ) -> Result<usize> {
        self.data.clear();
        self.records.clear();
        self.data.reserve(usize::try_from(expected_bytes).unwrap_or(0));
        reader.read_to_end(&mut self.data)?;
        self.index_records(index)?;
        Ok(self.records.len())
    }

    fn index_records(&mut self, index: &ContigIndex) -> Result<()> {
        let mut start = 0;
        let mut line_number = 0u64;
        let ends = memchr_iter(b'\n', &self.data).chain(std::iter::once(self.data.len()));
        for end in ends {
            if start >= self.data.len() {
                break;
            }
            line_number += 1;
            let line = trim_line_ending(&self.data[start..end]);
            if !line.is_empty() {
                let coordinate = record_coordinate(line, index, line_number)?;
                let arrival = self.records.len();
                self.records.push(AlignmentRecord {
                    arrival,
                    coordinate,
                    span: start..start + line.len(),
                });
            }
            start = end + 1;
        }
        Ok(())
    }

    /// Records in their current order.
    #[must_use]
    pub fn records(&self) -> &[AlignmentRecord] {
        &self.records
    }

    /// The line bytes of `record`, without terminator.
    #[must_use]
    pub fn line(&self, record: &AlignmentRecord) -> &[u8] {
        &self.data[record.span.clone()]
    }

    /// Order the records according to `strategy`.
    pub fn sort(&mut self, strategy: InBlockSort) -> InBlockOutcome {
        sort_records(&mut self.records, strategy)
    }

    /// Write every record line, in current order, each followed by `\n`.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        for record in &self.records {
            writer.write_all(self.line(record))?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }
}

/// Sort records by `(coordinate, arrival)`.
///
/// Arrival ids are unique, so the key is a total order and an unstable sort
/// still gives a deterministic result with ties in arrival order.
pub fn sort_records(records: &mut [AlignmentRecord], strategy: InBlockSort) -> InBlockOutcome {
    match strategy {
        InBlockSort::Full => {
            records.sort_unstable_by_key(AlignmentRecord::sort_key);
            InBlockOutcome::Full
        }
        InBlockSort::SubChunked { chunk_records } => {
            let chunk_records = chunk_records.max(1);
            for chunk in records.chunks_mut(chunk_records) {
                chunk.sort_unstable_by_key(AlignmentRecord::sort_key);
            }
            if chunk_boundaries_ordered(records, chunk_records) {
                InBlockOutcome::SubChunked
            } else {
                warn!(
                    "Sub-chunks of {chunk_records} records overlap in coordinate; \
                     sorting the block of {} records as a whole",
                    records.len()
                );
                records.sort_unstable_by_key(AlignmentRecord::sort_key);
                InBlockOutcome::FellBackToFull
            }
        }
    }
}

/// True when each sorted chunk ends at or before the start of the next one,
/// which makes the concatenation of the chunks sorted.
fn chunk_boundaries_ordered(records: &[AlignmentRecord], chunk_records: usize) -> bool {
    records
        .chunks(chunk_records)
        .zip(records.chunks(chunk_records).skip(1))
        .all(|(left, right)| match (left.last(), right.first()) {
            (Some(l), Some(r)) => l.sort_key() <= r.sort_key(),
            _ => true,
        })
}
