//! Contig offsets and the global coordinate sort key.
//!
//! Every `@SQ` line contributes its length to a running offset, so a record's
//! global coordinate is the cumulative length of all earlier contigs plus its
//! local 1-based position. Records with reference `*` get
//! [`GlobalCoordinate::UNALIGNED`], which sorts after every aligned position.

use std::io::Write;

use ahash::AHashMap;
use bstr::{BString, ByteSlice};

use crate::errors::{Result, SortError};

/// First byte of every header line.
pub const HEADER_SIGIL: u8 = b'@';

/// Record type of a sequence declaration line.
pub const SEQUENCE_RECORD: &[u8] = b"@SQ";

/// Key prefix of the contig name token.
pub const NAME_KEY: &[u8] = b"SN:";

/// Key prefix of the contig length token.
pub const LENGTH_KEY: &[u8] = b"LN:";

/// Reference name used by unaligned records.
pub const UNALIGNED_REFERENCE: &[u8] = b"*";

/// A single linear position across all contigs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalCoordinate(u64);

impl GlobalCoordinate {
    /// Sentinel for unaligned records; greater than any aligned coordinate.
    pub const UNALIGNED: Self = Self(u64::MAX);

    /// Wrap a raw coordinate value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw coordinate value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// True for the unaligned sentinel.
    #[must_use]
    pub const fn is_unaligned(self) -> bool {
        self.0 == u64::MAX
    }
}

/// Header lines captured from the input, kept verbatim apart from line endings.
///
/// Lines are stored without their terminator, `\r\n` included, and written back
/// with `\n`. A CRLF input therefore yields an LF output, header and records
/// alike.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderLines {
    lines: Vec<BString>,
}

impl HeaderLines {
    /// Empty header.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one header line.
    pub fn push(&mut self, line: &[u8]) {
        self.lines.push(BString::from(line));
    }

    /// Number of captured lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True if no header lines were seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterate over the captured lines.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.lines.iter().map(|line| line.as_slice())
    }

    /// Write every line, each followed by `\n`.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        for line in &self.lines {
            writer.write_all(line)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }
}

/// Maps contig names to their cumulative offset in declaration order.
///
/// Built once from the header, then shared read-only by both scanning passes
/// and every sort worker.
#[derive(Debug, Clone, Default)]
pub struct ContigIndex {
    offsets: AHashMap<BString, u64>,
    total_length: u64,
}

impl ContigIndex {
    /// An index with no contigs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a sequence of header lines.
    ///
    /// Lines that are not `@SQ` declarations are ignored.
    pub fn from_header_lines<'a, I>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut index = Self::new();
        for line in lines {
            index.add_header_line(line)?;
        }
        Ok(index)
    }

    /// Register the contig declared by `line`, if it is an `@SQ` line.
    ///
    /// Returns `true` when a contig was added.
    pub fn add_header_line(&mut self, line: &[u8]) -> Result<bool> {
        let line = line.trim_end_with(|c| c == '\n' || c == '\r');
        let mut tokens = line.split_str("\t");
        if tokens.next() != Some(SEQUENCE_RECORD) {
            return Ok(false);
        }

        let mut name: Option<&[u8]> = None;
        let mut length: Option<&[u8]> = None;
        for token in tokens {
            if let Some(value) = token.strip_prefix(NAME_KEY) {
                name.get_or_insert(value);
            } else if let Some(value) = token.strip_prefix(LENGTH_KEY) {
                length.get_or_insert(value);
            }
        }

        let name = match name {
            Some(value) if !value.is_empty() => value,
            Some(_) => return Err(malformed(line, "empty SN value")),
            None => return Err(malformed(line, "missing SN token")),
        };
        let length = match length {
            Some(value) if !value.is_empty() => value,
            Some(_) => return Err(malformed(line, "empty LN value")),
            None => return Err(malformed(line, "missing LN token")),
        };
        let length: u64 = length
            .to_str()
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| malformed(line, "LN value is not a non-negative integer"))?;

        self.declare(name, length).map_err(|reason| malformed(line, &reason))?;
        Ok(true)
    }

    fn declare(&mut self, name: &[u8], length: u64) -> std::result::Result<(), String> {
        if self.offsets.contains_key(name) {
            return Err(format!("contig '{}' declared twice", name.as_bstr()));
        }
        self.offsets.insert(BString::from(name), self.total_length);
        self.total_length = self
            .total_length
            .checked_add(length)
            .ok_or_else(|| "cumulative contig length overflows 64 bits".to_string())?;
        Ok(())
    }

    /// Cumulative offset of a contig, if declared.
    #[must_use]
    pub fn offset(&self, name: &[u8]) -> Option<u64> {
        self.offsets.get(name).copied()
    }

    /// Number of declared contigs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// True if no contigs were declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Sum of all declared contig lengths.
    #[must_use]
    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    /// Global coordinate of `position` on `reference`.
    ///
    /// A reference of `*` yields the unaligned sentinel whatever the position.
    pub fn global_coordinate(&self, reference: &[u8], position: u64) -> Result<GlobalCoordinate> {
        if reference == UNALIGNED_REFERENCE {
            return Ok(GlobalCoordinate::UNALIGNED);
        }
        let offset = self.offset(reference).ok_or_else(|| SortError::UnknownReference {
            name: reference.to_str_lossy().into_owned(),
        })?;
        // Saturate below the sentinel so a bogus position can never pass as unaligned.
        Ok(GlobalCoordinate(offset.saturating_add(position).min(u64::MAX - 1)))
    }
}

fn malformed(line: &[u8], reason: &str) -> SortError {
    SortError::MalformedHeader { line: line.to_str_lossy().into_owned(), reason: reason.to_string() }
}
