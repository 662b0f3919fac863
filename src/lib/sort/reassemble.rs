//! Final ordered concatenation of sorted blocks.
//!
//! Blocks cover disjoint, increasing coordinate ranges, so joining them in id
//! order is already a globally sorted file and no merge is needed.

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use tempfile::TempDir;

use crate::config::ConcatFailurePolicy;
use crate::errors::{Result, SortError};
use crate::sort::contig::HeaderLines;
use crate::sort::pool::SortedBlock;
use crate::toolkit::AlignmentToolkit;

/// How the output file came to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyOutcome {
    /// Blocks were concatenated into the output.
    Concatenated {
        /// Number of blocks joined.
        blocks: usize,
    },
    /// There were no records; the output holds only the header.
    HeaderOnly,
    /// Concatenation failed and the policy said to carry on.
    ConcatenationFailed {
        /// Description of the failure.
        reason: String,
    },
}

/// Joins sorted blocks into the output and disposes of the scratch directory.
pub struct Reassembler<'a> {
    toolkit: &'a dyn AlignmentToolkit,
    header: &'a HeaderLines,
    policy: ConcatFailurePolicy,
}

impl<'a> Reassembler<'a> {
    /// Reassembler using `toolkit` to join files.
    #[must_use]
    pub fn new(
        toolkit: &'a dyn AlignmentToolkit,
        header: &'a HeaderLines,
        policy: ConcatFailurePolicy,
    ) -> Self {
        Self { toolkit, header, policy }
    }

    /// Write `output` from `blocks`, which must be in id order.
    ///
    /// The scratch directory is removed on success. When concatenation fails
    /// under [`ConcatFailurePolicy::Error`] it is kept on disk and its path is
    /// logged, so the sorted blocks can be recovered.
    pub fn reassemble(
        &self,
        blocks: &[SortedBlock],
        output: &Path,
        scratch: TempDir,
    ) -> Result<ReassemblyOutcome> {
        debug_assert!(blocks.windows(2).all(|w| w[0].id < w[1].id));

        if blocks.is_empty() {
            let mut sink = self.toolkit.encode(output)?;
            self.header.write_to(&mut sink)?;
            sink.finish()?;
            return Ok(ReassemblyOutcome::HeaderOnly);
        }

        let inputs: Vec<PathBuf> = blocks.iter().map(|b| b.path.clone()).collect();
        match self.toolkit.concatenate(&inputs, output) {
            Ok(()) => {
                info!("Joined {} blocks into {}", blocks.len(), output.display());
                Ok(ReassemblyOutcome::Concatenated { blocks: blocks.len() })
            }
            Err(e @ SortError::ConcatenationFailure { .. })
                if self.policy == ConcatFailurePolicy::Warn =>
            {
                warn!("{e}; continuing and removing intermediate files");
                drop(scratch);
                Ok(ReassemblyOutcome::ConcatenationFailed { reason: e.to_string() })
            }
            Err(e) => {
                let kept = scratch.keep();
                error!("Sorted blocks kept for recovery in {}", kept.display());
                Err(e)
            }
        }
    }
}
