//! Worker threads that sort blocks independently.
//!
//! Workers claim block ids from a [`BlockQueue`], a counter behind a mutex.
//! Claim order across threads is unspecified; output order is fixed by block id
//! alone because every block is written to its own file. Finished blocks are
//! reported to the coordinating thread over a channel.
//!
//! Aligned blocks are loaded into the worker's [`BlockArena`], sorted and
//! encoded. Bypass blocks are copied through in arrival order. Every output
//! block starts with the full header so it is a standalone file.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use crossbeam_channel::unbounded;
use log::debug;
use parking_lot::Mutex;

use crate::config::SortConfig;
use crate::errors::{Result, SortError};
use crate::progress::ProgressTracker;
use crate::sort::block::{BlockArena, InBlockOutcome};
use crate::sort::contig::{ContigIndex, HeaderLines};
use crate::sort::partitioner::PartitionedBlock;
use crate::sort::planner::BlockKind;
use crate::toolkit::AlignmentToolkit;

/// Shared claim counter over `len` blocks.
#[derive(Debug)]
pub struct BlockQueue {
    next: Mutex<usize>,
    len: usize,
}

impl BlockQueue {
    /// Queue over block ids `0..len`.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self { next: Mutex::new(0), len }
    }

    /// Claim the next unclaimed block id, if any.
    pub fn claim(&self) -> Option<usize> {
        let mut next = self.next.lock();
        if *next >= self.len {
            return None;
        }
        let id = *next;
        *next += 1;
        Some(id)
    }

    /// Mark every remaining block as claimed, so workers stop.
    pub fn drain(&self) {
        *self.next.lock() = self.len;
    }
}

/// A block written in final order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedBlock {
    /// Block id.
    pub id: usize,
    /// Aligned or bypass.
    pub kind: BlockKind,
    /// Encoded block file, header included.
    pub path: PathBuf,
    /// Record lines written.
    pub records: u64,
    /// How an aligned block was ordered; `None` for bypass blocks.
    pub outcome: Option<InBlockOutcome>,
}

/// Name of the sorted file of block `id`.
#[must_use]
pub fn sorted_block_file_name(id: usize, extension: &str) -> String {
    format!("block_{id:06}.sorted.{extension}")
}

/// Runs the block sort on a fixed number of threads.
pub struct BlockSortWorkerPool<'a> {
    config: &'a SortConfig,
    toolkit: &'a dyn AlignmentToolkit,
    header: &'a HeaderLines,
    index: &'a ContigIndex,
    output_dir: &'a Path,
}

impl<'a> BlockSortWorkerPool<'a> {
    /// Pool writing sorted blocks into `output_dir`.
    #[must_use]
    pub fn new(
        config: &'a SortConfig,
        toolkit: &'a dyn AlignmentToolkit,
        header: &'a HeaderLines,
        index: &'a ContigIndex,
        output_dir: &'a Path,
    ) -> Self {
        Self { config, toolkit, header, index, output_dir }
    }

    /// Sort every block. Raw block files are removed once consumed.
    ///
    /// Returns the sorted blocks in id order. If any block fails, the remaining
    /// unclaimed blocks are abandoned and the first error is returned.
    pub fn run(&self, blocks: &[PartitionedBlock]) -> Result<Vec<SortedBlock>> {
        if blocks.is_empty() {
            return Ok(Vec::new());
        }
        let queue = BlockQueue::new(blocks.len());
        let threads = self.config.threads.clamp(1, blocks.len());
        let progress = ProgressTracker::new("Sorted blocks")
            .with_interval(1)
            .with_total(blocks.len() as u64);
        let mut sorted: Vec<Option<SortedBlock>> = vec![None; blocks.len()];
        let mut first_error: Option<SortError> = None;

        std::thread::scope(|scope| {
            let (tx, rx) = unbounded::<Result<SortedBlock>>();
            for worker in 0..threads {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || {
                    let mut arena = BlockArena::new();
                    while let Some(id) = queue.claim() {
                        let result = self.sort_block(&blocks[id], &mut arena, worker);
                        let failed = result.is_err();
                        if failed {
                            queue.drain();
                        }
                        if tx.send(result).is_err() || failed {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for result in rx {
                match result {
                    Ok(block) => {
                        progress.log_if_needed(1);
                        let id = block.id;
                        sorted[id] = Some(block);
                    }
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
        });
        progress.log_final();

        if let Some(e) = first_error {
            return Err(e);
        }
        sorted
            .into_iter()
            .enumerate()
            .map(|(id, block)| {
                block.ok_or_else(|| {
                    SortError::Io(io::Error::other(format!("block {id} was never sorted")))
                })
            })
            .collect()
    }

    fn sort_block(
        &self,
        block: &PartitionedBlock,
        arena: &mut BlockArena,
        worker: usize,
    ) -> Result<SortedBlock> {
        let descriptor = &block.descriptor;
        let path =
            self.output_dir.join(sorted_block_file_name(descriptor.id, self.toolkit.extension()));
        let mut sink = self.toolkit.encode(&path)?;
        self.header.write_to(&mut sink)?;

        let (records, outcome) = match descriptor.kind {
            BlockKind::Bypass => {
                let mut reader = BufReader::new(File::open(&block.path)?);
                io::copy(&mut reader, &mut sink)?;
                (descriptor.lines, None)
            }
            BlockKind::Aligned => {
                let file = File::open(&block.path)?;
                let loaded = arena.load(file, descriptor.bytes, self.index)? as u64;
                if loaded != descriptor.lines {
                    return Err(SortError::InputChanged {
                        reason: format!(
                            "block {} holds {loaded} records, planned {}",
                            descriptor.id, descriptor.lines
                        ),
                    });
                }
                let outcome = arena.sort(self.config.in_block_sort);
                arena.write_to(&mut sink)?;
                (loaded, Some(outcome))
            }
        };
        sink.finish()?;
        std::fs::remove_file(&block.path)?;

        debug!(
            "Worker {worker} finished {} block {} ({records} records)",
            descriptor.kind, descriptor.id
        );
        Ok(SortedBlock { id: descriptor.id, kind: descriptor.kind, path, records, outcome })
    }
}
