//! First pass: measure record volume per coordinate interval.
//!
//! The scanner streams the decoded input once, captures the header, and adds
//! each record's line length (plus one for the terminator) to the bucket that
//! covers its global coordinate. No record is kept in memory.
//!
//! Aligned buckets are `interval_width` coordinate units wide. Unaligned records
//! all share the sentinel coordinate, so the trailing unaligned bucket is
//! subdivided by arrival order into segments of roughly
//! `unaligned_segment_bytes` each (see [`UnalignedCursor`]). That lets the
//! planner split a large unaligned tail into several bypass blocks.

use std::io::BufRead;

use log::debug;

use crate::config::SortConfig;
use crate::errors::{Result, SortError};
use crate::progress::ProgressTracker;
use crate::sort::contig::{ContigIndex, GlobalCoordinate, HeaderLines};
use crate::sort::record::{LineReader, is_header_line, line_volume, record_coordinate};

/// Bookkeeping bytes per aligned bucket: its volume here plus its block slot in
/// the planner.
const BYTES_PER_BUCKET: u64 = (size_of::<BucketVolume>() + size_of::<Option<usize>>()) as u64;

/// Aligned bucket counts up to this are accepted whatever the memory budget.
const MIN_BUCKET_ALLOWANCE: u64 = 1 << 20;

/// Most aligned buckets a run with `total_memory` bytes may allocate.
#[must_use]
pub fn max_aligned_buckets(total_memory: u64) -> u64 {
    (total_memory / BYTES_PER_BUCKET).max(MIN_BUCKET_ALLOWANCE)
}

/// Byte and line volume of one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketVolume {
    /// Bytes the bucket's lines occupy, terminators included.
    pub bytes: u64,
    /// Number of lines.
    pub lines: u64,
}

impl BucketVolume {
    /// True if no line landed in the bucket.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines == 0
    }

    /// Add another volume to this one.
    pub fn add(&mut self, other: BucketVolume) {
        self.bytes += other.bytes;
        self.lines += other.lines;
    }
}

/// Address of a histogram bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketId {
    /// Aligned bucket, by interval index.
    Aligned(usize),
    /// Segment of the unaligned bucket, by arrival-ordered segment index.
    Unaligned(usize),
}

/// Assigns unaligned lines to arrival-ordered segments.
///
/// A line belongs to the segment in which its first byte falls. Running the
/// same cursor over the same lines always gives the same segments, which is what
/// lets the second pass find the block the first pass planned.
#[derive(Debug, Clone)]
pub struct UnalignedCursor {
    segment_bytes: u64,
    seen: u64,
}

impl UnalignedCursor {
    /// Cursor producing segments `segment_bytes` wide.
    #[must_use]
    pub fn new(segment_bytes: u64) -> Self {
        Self { segment_bytes: segment_bytes.max(1), seen: 0 }
    }

    /// Segment of the next unaligned line, advancing past it.
    pub fn advance(&mut self, volume: u64) -> usize {
        let segment = (self.seen / self.segment_bytes) as usize;
        self.seen += volume;
        segment
    }
}

/// Volume per coordinate interval, plus the unaligned segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalHistogram {
    interval_width: u64,
    aligned: Vec<BucketVolume>,
    unaligned: Vec<BucketVolume>,
    unaligned_segment_bytes: u64,
}

impl IntervalHistogram {
    /// Empty histogram with a fixed number of aligned buckets.
    #[must_use]
    pub fn new(interval_width: u64, aligned_buckets: usize, unaligned_segment_bytes: u64) -> Self {
        Self {
            interval_width: interval_width.max(1),
            aligned: vec![BucketVolume::default(); aligned_buckets.max(1)],
            unaligned: Vec::new(),
            unaligned_segment_bytes: unaligned_segment_bytes.max(1),
        }
    }

    /// Empty histogram covering every contig in `index`.
    ///
    /// One bucket per started interval of the total declared length, plus one
    /// so that a position equal to the total length still has a home. Fails
    /// with [`SortError::InvalidParameter`] if that takes more than
    /// `max_buckets` buckets.
    pub fn for_contigs(
        index: &ContigIndex,
        interval_width: u64,
        segment_bytes: u64,
        max_buckets: u64,
    ) -> Result<Self> {
        let width = interval_width.max(1);
        let buckets = index.total_length().div_ceil(width).saturating_add(1);
        let too_many = || {
            SortError::invalid_parameter(
                "interval-width",
                format!(
                    "width {width} splits {} coordinate units into {buckets} intervals, \
                     more than the {max_buckets} the memory budget allows; use a wider interval",
                    index.total_length()
                ),
            )
        };
        if buckets > max_buckets {
            return Err(too_many());
        }
        let buckets = usize::try_from(buckets).map_err(|_| too_many())?;
        Ok(Self::new(width, buckets, segment_bytes))
    }

    /// Width of an aligned bucket.
    #[must_use]
    pub fn interval_width(&self) -> u64 {
        self.interval_width
    }

    /// Byte width of an unaligned segment.
    #[must_use]
    pub fn unaligned_segment_bytes(&self) -> u64 {
        self.unaligned_segment_bytes
    }

    /// Aligned buckets in coordinate order.
    #[must_use]
    pub fn aligned(&self) -> &[BucketVolume] {
        &self.aligned
    }

    /// Unaligned segments in arrival order.
    #[must_use]
    pub fn unaligned(&self) -> &[BucketVolume] {
        &self.unaligned
    }

    /// Add volume to an aligned bucket.
    pub fn add_aligned(&mut self, bucket: usize, volume: BucketVolume) {
        let last = self.aligned.len() - 1;
        self.aligned[bucket.min(last)].add(volume);
    }

    /// Add volume to an unaligned segment, growing the segment list as needed.
    pub fn add_unaligned(&mut self, segment: usize, volume: BucketVolume) {
        if segment >= self.unaligned.len() {
            self.unaligned.resize(segment + 1, BucketVolume::default());
        }
        self.unaligned[segment].add(volume);
    }

    /// Add one line to the bucket `id`.
    pub fn record(&mut self, id: BucketId, volume: u64) {
        let line = BucketVolume { bytes: volume, lines: 1 };
        match id {
            BucketId::Aligned(bucket) => self.add_aligned(bucket, line),
            BucketId::Unaligned(segment) => self.add_unaligned(segment, line),
        }
    }

    /// Combined volume of all aligned buckets.
    #[must_use]
    pub fn aligned_total(&self) -> BucketVolume {
        sum(&self.aligned)
    }

    /// Combined volume of all unaligned segments.
    #[must_use]
    pub fn unaligned_total(&self) -> BucketVolume {
        sum(&self.unaligned)
    }

    /// Combined volume of the whole histogram.
    #[must_use]
    pub fn total(&self) -> BucketVolume {
        let mut total = self.aligned_total();
        total.add(self.unaligned_total());
        total
    }
}

/// Aligned bucket covering `coordinate` among `buckets` buckets of `width`.
///
/// Coordinates past the last bucket are clamped into it; since it is the last
/// aligned bucket, ordering between blocks is unaffected.
fn aligned_bucket(coordinate: GlobalCoordinate, width: u64, buckets: usize) -> usize {
    let last = buckets.saturating_sub(1);
    usize::try_from(coordinate.value() / width).map_or(last, |i| i.min(last))
}

fn sum(buckets: &[BucketVolume]) -> BucketVolume {
    buckets.iter().fold(BucketVolume::default(), |mut acc, b| {
        acc.add(*b);
        acc
    })
}

/// Maps record lines to histogram buckets.
///
/// Shared by both passes so they agree on every line's bucket.
pub struct BucketLocator<'a> {
    index: &'a ContigIndex,
    histogram_shape: (u64, usize),
    cursor: UnalignedCursor,
}

impl<'a> BucketLocator<'a> {
    /// Locator for the histogram's bucket layout.
    #[must_use]
    pub fn new(index: &'a ContigIndex, histogram: &IntervalHistogram) -> Self {
        Self {
            index,
            histogram_shape: (histogram.interval_width, histogram.aligned.len()),
            cursor: UnalignedCursor::new(histogram.unaligned_segment_bytes),
        }
    }

    /// Bucket of a record line. Advances the unaligned cursor for `*` records.
    pub fn locate(&mut self, line: &[u8], line_number: u64) -> Result<BucketId> {
        let coordinate = record_coordinate(line, self.index, line_number)?;
        if coordinate.is_unaligned() {
            return Ok(BucketId::Unaligned(self.cursor.advance(line_volume(line))));
        }
        let (width, buckets) = self.histogram_shape;
        Ok(BucketId::Aligned(aligned_bucket(coordinate, width, buckets)))
    }
}

/// Output of the first pass.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Header lines, verbatim.
    pub header: HeaderLines,
    /// Contig offsets built from the header.
    pub index: ContigIndex,
    /// Record volume per bucket.
    pub histogram: IntervalHistogram,
    /// Number of record (non-header) lines.
    pub records: u64,
}

/// Streams a decoded alignment file and measures it.
pub struct HistogramScanner<'a> {
    config: &'a SortConfig,
}

impl<'a> HistogramScanner<'a> {
    /// Scanner using the bucket widths from `config`.
    #[must_use]
    pub fn new(config: &'a SortConfig) -> Self {
        Self { config }
    }

    /// Scan the whole input.
    ///
    /// Header lines must precede all records: the contig index is frozen at the
    /// first record line.
    pub fn scan<R: BufRead>(&self, reader: R) -> Result<ScanResult> {
        let mut lines = LineReader::new(reader);
        let mut header = HeaderLines::new();
        let mut index = ContigIndex::new();

        let mut first_record: Option<(u64, Vec<u8>)> = None;
        while let Some((line_number, line)) = lines.next_line()? {
            if !is_header_line(line) {
                first_record = Some((line_number, line.to_vec()));
                break;
            }
            index.add_header_line(line)?;
            header.push(line);
        }

        let mut histogram = IntervalHistogram::for_contigs(
            &index,
            self.config.interval_width,
            self.config.effective_segment_bytes(),
            max_aligned_buckets(self.config.total_memory),
        )?;
        debug!(
            "Header complete: {} lines, {} contigs, {} aligned buckets",
            header.len(),
            index.len(),
            histogram.aligned().len()
        );

        let mut records = 0u64;
        let progress = ProgressTracker::new("Scanned records").with_interval(1_000_000);
        if let Some((line_number, line)) = first_record {
            let mut locator = BucketLocator::new(&index, &histogram);
            histogram.record(locator.locate(&line, line_number)?, line_volume(&line));
            records += 1;
            progress.log_if_needed(1);

            while let Some((line_number, line)) = lines.next_line()? {
                if is_header_line(line) {
                    return Err(SortError::MalformedHeader {
                        line: String::from_utf8_lossy(line).into_owned(),
                        reason: format!("header line {line_number} follows record lines"),
                    });
                }
                histogram.record(locator.locate(line, line_number)?, line_volume(line));
                records += 1;
                progress.log_if_needed(1);
            }
        }
        progress.log_final();

        Ok(ScanResult { header, index, histogram, records })
    }
}
