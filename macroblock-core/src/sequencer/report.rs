//! Pass reports.

use serde::{Deserialize, Serialize};

use crate::macroblock::BlockId;

/// How a sequencing pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassOutcome {
    /// Every block executed.
    Completed,
    /// The pass hit its iteration bound with blocks left unexecuted.
    Stalled,
}

/// Summary of one sequencing pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    pub outcome: PassOutcome,
    /// Blocks in the order they were executed.
    pub executed: Vec<BlockId>,
    /// Blocks that did not execute, in block order.
    pub pending: Vec<BlockId>,
    /// Readiness checks spent. For the serial strategy this is the number of
    /// cursor advances.
    pub advances: usize,
}

impl SequenceReport {
    pub(crate) fn completed(executed: Vec<BlockId>, advances: usize) -> Self {
        Self {
            outcome: PassOutcome::Completed,
            executed,
            pending: Vec::new(),
            advances,
        }
    }

    pub(crate) fn stalled(executed: Vec<BlockId>, pending: Vec<BlockId>, advances: usize) -> Self {
        Self {
            outcome: PassOutcome::Stalled,
            executed,
            pending,
            advances,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outcome == PassOutcome::Completed
    }

    /// The warning text emitted for a stalled pass.
    pub fn stall_message(&self) -> Option<String> {
        if self.is_complete() {
            return None;
        }
        let uids = self
            .pending
            .iter()
            .map(BlockId::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "Macroblock sequencer stalled after {} advances; unexecuted macroblocks: {}",
            self.advances, uids
        ))
    }
}
