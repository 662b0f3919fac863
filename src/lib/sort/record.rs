//! Record line parsing.
//!
//! The engine only looks at the reference name (field 2) and the 1-based
//! position (field 3) of each tab-delimited record line. Everything else is an
//! opaque payload that is copied through unchanged.

use std::io::{self, BufRead};
use std::ops::Range;

use bstr::ByteSlice;
use memchr::memchr;

use crate::errors::{Result, SortError};
use crate::sort::contig::{ContigIndex, GlobalCoordinate, HEADER_SIGIL, UNALIGNED_REFERENCE};

/// 0-based index of the reference name field.
pub const REFERENCE_FIELD: usize = 2;

/// 0-based index of the position field.
pub const POSITION_FIELD: usize = 3;

/// The two fields of a record line the engine needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFields<'a> {
    /// Reference (contig) name.
    pub reference: &'a [u8],
    /// Position text, not yet parsed.
    pub position: &'a [u8],
}

/// True for header lines.
#[inline]
#[must_use]
pub fn is_header_line(line: &[u8]) -> bool {
    line.first() == Some(&HEADER_SIGIL)
}

/// Strip a trailing `\n` or `\r\n`.
#[inline]
#[must_use]
pub fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Bytes a line occupies in an intermediate file: the line plus its `\n`.
#[inline]
#[must_use]
pub fn line_volume(line: &[u8]) -> u64 {
    line.len() as u64 + 1
}

/// Split out the reference and position fields, stopping after the position.
///
/// Returns `None` when the line has fewer than four fields.
#[must_use]
pub fn split_record_fields(line: &[u8]) -> Option<RecordFields<'_>> {
    let mut start = 0;
    let mut reference: &[u8] = &[];
    for field in 0..=POSITION_FIELD {
        let end = if field == POSITION_FIELD {
            memchr(b'\t', &line[start..]).map_or(line.len(), |i| start + i)
        } else {
            start + memchr(b'\t', &line[start..])?
        };
        match field {
            REFERENCE_FIELD => reference = &line[start..end],
            POSITION_FIELD => return Some(RecordFields { reference, position: &line[start..end] }),
            _ => {}
        }
        start = end + 1;
    }
    None
}

/// Parse a position field as an unsigned decimal.
#[must_use]
pub fn parse_position(text: &[u8]) -> Option<u64> {
    if text.is_empty() || !text.iter().all(u8::is_ascii_digit) {
        return None;
    }
    text.to_str().ok()?.parse().ok()
}

/// Compute the global coordinate of one record line.
///
/// `line_number` is only used for error messages.
pub fn record_coordinate(
    line: &[u8],
    index: &ContigIndex,
    line_number: u64,
) -> Result<GlobalCoordinate> {
    let fields = split_record_fields(line).ok_or_else(|| SortError::MalformedRecord {
        line_number,
        reason: "fewer than four tab-separated fields".to_string(),
    })?;
    if fields.reference == UNALIGNED_REFERENCE {
        return Ok(GlobalCoordinate::UNALIGNED);
    }
    let position = parse_position(fields.position).ok_or_else(|| SortError::MalformedRecord {
        line_number,
        reason: format!("position '{}' is not an unsigned integer", fields.position.as_bstr()),
    })?;
    index.global_coordinate(fields.reference, position)
}

/// One record inside a block arena.
///
/// The payload is not owned: `span` addresses the line's bytes inside the
/// [`crate::sort::block::BlockArena`] the record was indexed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord {
    /// Order of arrival within the block, used to keep equal coordinates stable.
    pub arrival: usize,
    /// Sort key.
    pub coordinate: GlobalCoordinate,
    /// Byte range of the line (without terminator) in the arena.
    pub span: Range<usize>,
}

impl AlignmentRecord {
    /// Total ordering key: coordinate, then arrival.
    #[inline]
    #[must_use]
    pub fn sort_key(&self) -> (GlobalCoordinate, usize) {
        (self.coordinate, self.arrival)
    }
}

/// Reads lines from a buffered source into a reused buffer.
///
/// Lines are yielded without their terminator (`\n` or `\r\n`), paired with
/// their 1-based line number in the stream. Blank lines are skipped but still
/// counted.
pub struct LineReader<R> {
    reader: R,
    buffer: Vec<u8>,
    line_number: u64,
}

impl<R: BufRead> LineReader<R> {
    /// Wrap a buffered reader.
    pub fn new(reader: R) -> Self {
        Self { reader, buffer: Vec::with_capacity(1024), line_number: 0 }
    }

    /// Next non-empty line and its number, or `None` at end of input.
    pub fn next_line(&mut self) -> io::Result<Option<(u64, &[u8])>> {
        loop {
            self.buffer.clear();
            if self.reader.read_until(b'\n', &mut self.buffer)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            if !trim_line_ending(&self.buffer).is_empty() {
                return Ok(Some((self.line_number, trim_line_ending(&self.buffer))));
            }
        }
    }
}
