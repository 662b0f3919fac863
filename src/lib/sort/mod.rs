//! Two-pass, block-parallel coordinate sort.
//!
//! Records are ordered by a single global coordinate: the cumulative length of
//! all contigs declared before a record's contig plus its 1-based position.
//! Unaligned records (`*` reference) sort after everything else.
//!
//! # Architecture
//!
//! 1. **Scan** ([`HistogramScanner`]): stream the input once, capture the
//!    header, and measure bytes and lines per fixed-width coordinate interval.
//! 2. **Plan** ([`PartitionPlanner`]): pack adjacent intervals into blocks that
//!    fit the per-thread memory budget; pack unaligned volume into bypass
//!    blocks that come last.
//! 3. **Partition** ([`Partitioner`]): stream the input again and append each
//!    record to its block's file.
//! 4. **Sort** ([`BlockSortWorkerPool`]): worker threads claim blocks, sort each
//!    aligned block in memory and copy bypass blocks through.
//! 5. **Reassemble** ([`Reassembler`]): concatenate blocks in id order. Blocks
//!    hold disjoint, increasing coordinate ranges, so no merge is needed.
//!
//! [`BlockSorter`] runs all five stages.

pub mod block;
pub mod contig;
pub mod histogram;
pub mod partitioner;
pub mod planner;
pub mod pool;
pub mod reassemble;
pub mod record;
pub mod sorter;
pub mod verify;

pub use block::{BlockArena, InBlockOutcome, sort_records};
pub use contig::{ContigIndex, GlobalCoordinate, HeaderLines};
pub use histogram::{
    BucketId, BucketLocator, BucketVolume, HistogramScanner, IntervalHistogram, ScanResult,
    UnalignedCursor,
};
pub use partitioner::{PartitionedBlock, Partitioner};
pub use planner::{BlockDescriptor, BlockKind, PartitionPlan, PartitionPlanner};
pub use pool::{BlockQueue, BlockSortWorkerPool, SortedBlock};
pub use reassemble::{ReassemblyOutcome, Reassembler};
pub use record::AlignmentRecord;
pub use sorter::{BlockSorter, SortStats};
pub use verify::{SortVerifier, VerifyReport, Violation};
