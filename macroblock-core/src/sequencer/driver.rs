//! Round-Robin Sequencer
//!
//! # Algorithm
//!
//! A cursor walks the block list circularly. At each position:
//!
//! 1. A `Done` block is skipped.
//! 2. Otherwise the block's state is recomputed from live dirty flags.
//! 3. A `Ready` block is handed to the executor and marked `Done`.
//!
//! The pass completes when every block is `Done`. It stalls once the cursor
//! has advanced `stall_factor * block_count` times without completing; the
//! blocks left unexecuted are reported through the diagnostics sink and the
//! pass returns normally.
//!
//! Readiness cannot be decided up front: a block that is not ready when first
//! visited becomes ready once a sibling's execution cleans its inputs later in
//! the same pass. Polling round-robin reaches every satisfiable block within
//! `block_count` rotations; the stall bound turns a cyclic or unsatisfiable
//! graph into a bounded amount of wasted checks instead of a hang.
//!
//! Whatever the outcome, every block is reset to `Ready` before returning, so
//! the same block list can be sequenced again next cycle.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::diagnostics::{DiagnosticSink, TracingSink};
use super::executor::{BlockEntry, Executor, ForkableExecutor};
use super::report::SequenceReport;
use crate::config::SequencerConfig;
use crate::error::SequenceError;
use crate::graph::ProgramSnapshot;
use crate::macroblock::{BlockId, ExecuteState, Macroblock};

/// How ready blocks are dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    /// One block at a time, in round-robin order.
    #[default]
    Serial,
    /// Every block ready at the same time runs concurrently on its own
    /// executor fork.
    Parallel,
}

/// Orders and drives macroblock execution.
pub struct Sequencer {
    pub(super) config: SequencerConfig,
    pub(super) diagnostics: Arc<dyn DiagnosticSink>,
    /// Dedicated worker pool for the parallel strategy, built on first use.
    pub(super) pool: Mutex<Option<Arc<rayon::ThreadPool>>>,
}

impl Sequencer {
    /// Create a sequencer with default settings that reports to `diagnostics`.
    pub fn new(diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self::with_config(SequencerConfig::default(), diagnostics)
    }

    /// Create a sequencer with explicit settings.
    pub fn with_config(config: SequencerConfig, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            config,
            diagnostics,
            pool: Mutex::new(None),
        }
    }

    /// Get the active settings.
    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Number of cursor advances after which a pass over `block_count` blocks stalls.
    ///
    /// Saturates at `usize::MAX` for very large stall factors.
    pub fn stall_limit(&self, block_count: usize) -> usize {
        self.config.stall_factor.max(1).saturating_mul(block_count)
    }

    /// Run one serial pass over `blocks`.
    ///
    /// Returns a report for completed and stalled passes alike. Errors are
    /// reserved for malformed block lists, which are rejected before anything
    /// runs, and for executor failures, which abort the pass.
    #[instrument(skip_all, fields(blocks = blocks.len()))]
    pub fn execute<E: Executor>(
        &self,
        blocks: &mut [Macroblock],
        snapshot: &ProgramSnapshot,
        executor: &mut E,
        entry: &BlockEntry<E::Frame>,
    ) -> Result<SequenceReport, SequenceError> {
        validate(blocks, snapshot)?;
        if blocks.is_empty() {
            return Ok(SequenceReport::completed(Vec::new(), 0));
        }

        executor.setup_entry(entry);
        let result = self.round_robin(blocks, snapshot, executor);
        reset(blocks);
        self.finish(result)
    }

    /// Run one pass with the configured strategy.
    pub fn dispatch<E>(
        &self,
        blocks: &mut [Macroblock],
        snapshot: &ProgramSnapshot,
        executor: &mut E,
        entry: &BlockEntry<E::Frame>,
    ) -> Result<SequenceReport, SequenceError>
    where
        E: ForkableExecutor,
        E::Frame: Sync,
    {
        match self.config.strategy {
            ExecutionStrategy::Serial => self.execute(blocks, snapshot, executor, entry),
            ExecutionStrategy::Parallel => self.execute_parallel(blocks, snapshot, executor, entry),
        }
    }

    fn round_robin<E: Executor>(
        &self,
        blocks: &mut [Macroblock],
        snapshot: &ProgramSnapshot,
        executor: &mut E,
    ) -> Result<SequenceReport, SequenceError> {
        let count = blocks.len();
        let limit = self.stall_limit(count);
        let mut executed = Vec::with_capacity(count);
        let mut cursor = 0;
        let mut advances = 0;

        while executed.len() < count {
            if advances >= limit {
                return Ok(stalled(blocks, executed, advances));
            }

            let block = &mut blocks[cursor];
            if block.refresh_state(snapshot) == ExecuteState::Ready {
                block.set_state(ExecuteState::Executing);
                tracing::trace!(block = %block.id(), "Executing macroblock");
                executor
                    .execute(block, snapshot)
                    .map_err(|e| SequenceError::Executor {
                        block: block.id(),
                        source: Box::new(e),
                    })?;
                block.set_state(ExecuteState::Done);
                executed.push(block.id());
            }

            cursor = (cursor + 1) % count;
            advances += 1;
        }

        Ok(SequenceReport::completed(executed, advances))
    }

    /// Log the outcome and emit the stall diagnostic, if any.
    pub(super) fn finish(
        &self,
        result: Result<SequenceReport, SequenceError>,
    ) -> Result<SequenceReport, SequenceError> {
        let report = result?;
        match report.stall_message() {
            Some(message) => self.diagnostics.warning(&message),
            None => tracing::debug!(
                executed = report.executed.len(),
                advances = report.advances,
                "Sequencing pass completed"
            ),
        }
        Ok(report)
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

/// Reject block lists the sequencer cannot run.
pub(super) fn validate(
    blocks: &[Macroblock],
    snapshot: &ProgramSnapshot,
) -> Result<(), SequenceError> {
    for block in blocks {
        if block.is_empty() {
            return Err(SequenceError::EmptyBlock(block.id()));
        }
        if !block.members().contains(&block.entry_node()) {
            return Err(SequenceError::EntryNotMember {
                block: block.id(),
                entry: block.entry_node(),
            });
        }
        if let Some(&node) = block
            .members()
            .iter()
            .find(|member| snapshot.get_node(**member).is_none())
        {
            return Err(SequenceError::UnknownNode {
                block: block.id(),
                node,
            });
        }
    }
    Ok(())
}

/// Build the report for a pass that ran out of advances.
pub(super) fn stalled(
    blocks: &[Macroblock],
    executed: Vec<BlockId>,
    advances: usize,
) -> SequenceReport {
    let pending = blocks
        .iter()
        .filter(|block| block.state() != ExecuteState::Done)
        .map(Macroblock::id)
        .collect();
    SequenceReport::stalled(executed, pending, advances)
}

/// Prepare the list for the next cycle.
pub(super) fn reset(blocks: &mut [Macroblock]) {
    for block in blocks {
        block.set_state(ExecuteState::Ready);
    }
}
