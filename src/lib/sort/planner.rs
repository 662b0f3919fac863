//! Greedy packing of histogram buckets into memory-bounded blocks.
//!
//! Aligned buckets are walked in coordinate order and packed into blocks so
//! that no block's planned volume exceeds the per-thread budget. Blocks stay
//! coordinate-contiguous, which is what lets reassembly be a plain concatenation.
//! The unaligned segments are then packed the same way into bypass blocks,
//! whose ids follow every aligned block.
//!
//! A single bucket larger than the budget cannot be split without breaking
//! contiguity; it becomes a block of its own and is flagged `oversized`.

use std::fmt;

use log::warn;

use crate::logging::format_bytes;
use crate::sort::histogram::{BucketId, BucketVolume, IntervalHistogram};

/// Whether a block is sorted or streamed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Contains aligned records; sorted by the worker pool.
    Aligned,
    /// Contains only unaligned records; copied in arrival order.
    Bypass,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aligned => write!(f, "aligned"),
            Self::Bypass => write!(f, "bypass"),
        }
    }
}

/// One planned block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDescriptor {
    /// Dense, 0-based block id; also the block's position in the output.
    pub id: usize,
    /// Aligned or bypass.
    pub kind: BlockKind,
    /// Planned byte volume, terminators included.
    pub bytes: u64,
    /// Planned number of record lines.
    pub lines: u64,
    /// True when a single bucket alone exceeded the budget.
    pub oversized: bool,
}

impl BlockDescriptor {
    /// True for blocks that skip the sort.
    #[must_use]
    pub fn is_bypass(&self) -> bool {
        self.kind == BlockKind::Bypass
    }
}

/// Blocks plus the map from every bucket to the block that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    blocks: Vec<BlockDescriptor>,
    aligned_assignment: Vec<Option<usize>>,
    unaligned_assignment: Vec<Option<usize>>,
    budget: u64,
}

impl PartitionPlan {
    /// Blocks in id order.
    #[must_use]
    pub fn blocks(&self) -> &[BlockDescriptor] {
        &self.blocks
    }

    /// Block owning bucket `id`, or `None` if the first pass saw it empty.
    #[must_use]
    pub fn block_for(&self, id: BucketId) -> Option<usize> {
        match id {
            BucketId::Aligned(bucket) => self.aligned_assignment.get(bucket).copied().flatten(),
            BucketId::Unaligned(segment) => {
                self.unaligned_assignment.get(segment).copied().flatten()
            }
        }
    }

    /// Per-block budget the plan was built for.
    #[must_use]
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Number of aligned blocks.
    #[must_use]
    pub fn aligned_block_count(&self) -> usize {
        self.blocks.iter().filter(|b| !b.is_bypass()).count()
    }

    /// Number of bypass blocks.
    #[must_use]
    pub fn bypass_block_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_bypass()).count()
    }

    /// Number of blocks over budget.
    #[must_use]
    pub fn oversized_block_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.oversized).count()
    }

    /// Sum of planned lines over all blocks.
    #[must_use]
    pub fn total_lines(&self) -> u64 {
        self.blocks.iter().map(|b| b.lines).sum()
    }

    /// True if there is nothing to sort.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Builds a [`PartitionPlan`] from a histogram.
#[derive(Debug, Clone, Copy)]
pub struct PartitionPlanner {
    budget: u64,
}

impl PartitionPlanner {
    /// Planner for blocks of at most `budget` bytes.
    #[must_use]
    pub fn new(budget: u64) -> Self {
        Self { budget: budget.max(1) }
    }

    /// Pack the histogram into blocks.
    #[must_use]
    pub fn plan(&self, histogram: &IntervalHistogram) -> PartitionPlan {
        let mut blocks = Vec::new();
        let aligned_assignment =
            self.pack(histogram.aligned(), BlockKind::Aligned, &mut blocks);
        let unaligned_assignment =
            self.pack(histogram.unaligned(), BlockKind::Bypass, &mut blocks);
        PartitionPlan { blocks, aligned_assignment, unaligned_assignment, budget: self.budget }
    }

    /// Greedy sequential fill. Returns the bucket-to-block map for `buckets`.
    fn pack(
        &self,
        buckets: &[BucketVolume],
        kind: BlockKind,
        blocks: &mut Vec<BlockDescriptor>,
    ) -> Vec<Option<usize>> {
        let mut assignment = vec![None; buckets.len()];
        let mut open: Option<OpenBlock> = None;

        for (index, bucket) in buckets.iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            if open.as_ref().is_some_and(|b| b.volume.bytes + bucket.bytes > self.budget) {
                if let Some(done) = open.take() {
                    blocks.push(self.close(done, kind, blocks.len()));
                }
            }
            let current = open.get_or_insert_with(OpenBlock::default);
            current.volume.add(*bucket);
            current.buckets += 1;
            assignment[index] = Some(blocks.len());
        }
        if let Some(done) = open {
            blocks.push(self.close(done, kind, blocks.len()));
        }
        assignment
    }

    fn close(&self, block: OpenBlock, kind: BlockKind, id: usize) -> BlockDescriptor {
        let oversized = block.volume.bytes > self.budget;
        if oversized {
            // Only a single bucket can get here: any second bucket would have closed the block.
            debug_assert_eq!(block.buckets, 1);
            warn!(
                "Block {id} ({kind}) holds a single interval of {} which exceeds the {} budget; \
                 it will be sorted as one oversized block",
                format_bytes(block.volume.bytes),
                format_bytes(self.budget)
            );
        }
        BlockDescriptor {
            id,
            kind,
            bytes: block.volume.bytes,
            lines: block.volume.lines,
            oversized,
        }
    }
}

#[derive(Debug, Default)]
struct OpenBlock {
    volume: BucketVolume,
    buckets: usize,
}
