//! Second pass: split the record stream into one file per planned block.
//!
//! Each record is located in the same bucket the first pass put it in, and its
//! line is appended, in arrival order, to the file of the block that owns the
//! bucket. Header lines are skipped. Nothing is sorted here.
//!
//! A plan can hold far more blocks than the process may keep files open, so
//! only the most recently written block files stay open (see [`BlockWriters`]).
//! A block file pushed out of that set is flushed and closed, and reopened in
//! append mode when its next record arrives.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufWriter, Write};
use std::num::NonZero;
use std::path::{Path, PathBuf};

use log::debug;
use lru::LruCache;

use crate::config::{DEFAULT_MAX_OPEN_FILES, DEFAULT_TOTAL_MEMORY};
use crate::errors::{Result, SortError};
use crate::logging::format_bytes;
use crate::progress::ProgressTracker;
use crate::sort::histogram::{BucketLocator, ScanResult};
use crate::sort::planner::{BlockDescriptor, PartitionPlan};
use crate::sort::record::{LineReader, is_header_line, line_volume};

const MIN_WRITER_BUFFER_SIZE: usize = 4 * 1024;
const MAX_WRITER_BUFFER_SIZE: usize = 64 * 1024;

/// Buffer size for each open block writer: the memory budget shared by
/// `open_files` writers, kept within 4 KiB to 64 KiB.
#[must_use]
pub fn writer_buffer_size(memory: u64, open_files: usize) -> usize {
    let share = memory / open_files.max(1) as u64;
    usize::try_from(share)
        .unwrap_or(MAX_WRITER_BUFFER_SIZE)
        .clamp(MIN_WRITER_BUFFER_SIZE, MAX_WRITER_BUFFER_SIZE)
}

/// A block's unsorted records on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionedBlock {
    /// The planned block.
    pub descriptor: BlockDescriptor,
    /// File holding the block's record lines, one per line, no header.
    pub path: PathBuf,
}

/// Name of the raw (pre-sort) file of block `id`.
#[must_use]
pub fn raw_block_file_name(id: usize) -> String {
    format!("block_{id:06}.raw.sam")
}

/// Buffered append handles to block files, at most `capacity` open at once.
///
/// Evicts the least recently written block when full. Every file is created
/// empty up front so a reopened block only ever appends.
struct BlockWriters {
    paths: Vec<PathBuf>,
    open: LruCache<usize, BufWriter<File>>,
    buffer_size: usize,
    opens: u64,
}

impl BlockWriters {
    fn create(paths: Vec<PathBuf>, capacity: NonZero<usize>, buffer_size: usize) -> Result<Self> {
        for path in &paths {
            File::create(path)?;
        }
        Ok(Self { paths, open: LruCache::new(capacity), buffer_size, opens: 0 })
    }

    /// Append `line` and a newline to block `block`'s file.
    fn write_line(&mut self, block: usize, line: &[u8]) -> Result<()> {
        if !self.open.contains(&block) {
            let file = OpenOptions::new().append(true).open(&self.paths[block])?;
            self.opens += 1;
            let writer = BufWriter::with_capacity(self.buffer_size, file);
            if let Some((_, mut evicted)) = self.open.push(block, writer) {
                evicted.flush()?;
            }
        }
        let writer = self.open.get_mut(&block).ok_or_else(|| {
            io::Error::other(format!("writer for block {block} missing after open"))
        })?;
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flush and close every open file, returning the block paths.
    fn finish(mut self) -> Result<Vec<PathBuf>> {
        while let Some((_, mut writer)) = self.open.pop_lru() {
            writer.flush()?;
        }
        Ok(self.paths)
    }
}

/// Writes record lines to per-block files following a plan.
pub struct Partitioner<'a> {
    scan: &'a ScanResult,
    plan: &'a PartitionPlan,
    output_dir: &'a Path,
    max_open_files: usize,
    buffer_memory: u64,
}

impl<'a> Partitioner<'a> {
    /// Partitioner writing into `output_dir`.
    #[must_use]
    pub fn new(scan: &'a ScanResult, plan: &'a PartitionPlan, output_dir: &'a Path) -> Self {
        Self {
            scan,
            plan,
            output_dir,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            buffer_memory: DEFAULT_TOTAL_MEMORY,
        }
    }

    /// Keep at most `limit` block files open at once (minimum 1).
    #[must_use]
    pub fn max_open_files(mut self, limit: usize) -> Self {
        self.max_open_files = limit.max(1);
        self
    }

    /// Memory shared by the write buffers of the open block files.
    #[must_use]
    pub fn buffer_memory(mut self, bytes: u64) -> Self {
        self.buffer_memory = bytes;
        self
    }

    /// Stream the input a second time and write the block files.
    ///
    /// Fails with [`SortError::InputChanged`] if the stream does not match what
    /// the first pass measured.
    pub fn partition<R: BufRead>(&self, reader: R) -> Result<Vec<PartitionedBlock>> {
        let blocks = self.plan.blocks();
        let paths =
            blocks.iter().map(|b| self.output_dir.join(raw_block_file_name(b.id))).collect();
        let open_files = self.max_open_files.clamp(1, blocks.len().max(1));
        let capacity = NonZero::new(open_files).unwrap_or(NonZero::<usize>::MIN);
        let buffer_size = writer_buffer_size(self.buffer_memory, open_files);
        debug!(
            "Writing {} block files, at most {open_files} open, {} buffer each",
            blocks.len(),
            format_bytes(buffer_size as u64)
        );
        let mut writers = BlockWriters::create(paths, capacity, buffer_size)?;

        let mut lines_written = vec![0u64; blocks.len()];
        let mut bytes_written = vec![0u64; blocks.len()];
        let mut header_lines = 0usize;
        let mut locator = BucketLocator::new(&self.scan.index, &self.scan.histogram);
        let progress = ProgressTracker::new("Partitioned records")
            .with_interval(1_000_000)
            .with_total(self.scan.records);

        let mut lines = LineReader::new(reader);
        while let Some((line_number, line)) = lines.next_line()? {
            if is_header_line(line) {
                header_lines += 1;
                continue;
            }
            let bucket = locator.locate(line, line_number)?;
            let block = self.plan.block_for(bucket).ok_or_else(|| input_changed(format!(
                "record at line {line_number} falls in {bucket:?}, which the first pass saw empty"
            )))?;
            lines_written[block] += 1;
            if lines_written[block] > blocks[block].lines {
                return Err(input_changed(format!(
                    "block {block} received more than the {} records planned for it",
                    blocks[block].lines
                )));
            }
            bytes_written[block] += line_volume(line);
            writers.write_line(block, line)?;
            progress.log_if_needed(1);
        }
        progress.log_final();

        if header_lines != self.scan.header.len() {
            return Err(input_changed(format!(
                "{header_lines} header lines now, {} in the first pass",
                self.scan.header.len()
            )));
        }
        let opens = writers.opens;
        let paths = writers.finish()?;
        if opens > blocks.len() as u64 {
            debug!("Reopened block files {} times", opens - blocks.len() as u64);
        }

        let mut partitioned = Vec::with_capacity(blocks.len());
        for ((block, path), (lines, bytes)) in
            blocks.iter().zip(paths).zip(lines_written.into_iter().zip(bytes_written))
        {
            if lines != block.lines || bytes != block.bytes {
                return Err(input_changed(format!(
                    "block {} has {lines} records ({bytes} bytes), planned {} ({} bytes)",
                    block.id, block.lines, block.bytes
                )));
            }
            partitioned.push(PartitionedBlock { descriptor: block.clone(), path });
        }
        Ok(partitioned)
    }
}

fn input_changed(reason: String) -> SortError {
    SortError::InputChanged { reason }
}
