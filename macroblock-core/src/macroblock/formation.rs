//! Macroblock Formation
//!
//! Formation partitions a program snapshot into macroblocks. It runs once per
//! snapshot (once per edit cycle); the sequencer then reuses the result for
//! every execution cycle until the graph shape changes.
//!
//! # Algorithm
//!
//! A node is an entry point when it is not a return node and
//!
//! - it has no parents (a self-contained computation such as `a = 1`), or
//! - it has more than one child (its value fans out), or
//! - its parents write more than one distinct target (its inputs fan in).
//!
//! Blocks are then built in three passes, each visiting a node at most once:
//!
//! 1. Diverging nodes: every child of a node with more than one child starts
//!    its own block, so each consumer can run as soon as its own inputs are
//!    available.
//! 2. Entry points: every remaining entry point starts a block.
//! 3. Orphans: nodes only reachable through a cycle or an inactive producer
//!    start a block each, so every schedulable node is covered.
//!
//! Each new block absorbs the chain behind its head: any unvisited non-entry
//! node reading the head's target joins the block, and absorption continues
//! from it. Chains stop at fan-out and fan-in boundaries, which own their
//! blocks.
//!
//! Inactive and return nodes are never scheduled.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::block::{BlockId, Macroblock};
use super::grouping::distinct_targets;
use crate::config::FormationConfig;
use crate::error::FormationError;
use crate::graph::{NodeIndex, ProgramSnapshot};

/// How a snapshot is partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormationStrategy {
    /// Entry-point and chain-absorption partitioning.
    Default,

    /// Partitioning driven by static analysis of the snapshot. Not implemented.
    StaticAnalysis,
}

/// Pick the partitioning strategy for a snapshot.
///
/// Only the default strategy exists, so the choice is unconditional.
pub fn select_strategy(_snapshot: &ProgramSnapshot) -> FormationStrategy {
    FormationStrategy::Default
}

/// Check whether `index` starts a new macroblock.
pub fn is_entry_point(snapshot: &ProgramSnapshot, index: NodeIndex) -> bool {
    let Some(node) = snapshot.get_node(index) else {
        return false;
    };
    if node.is_return() {
        return false;
    }

    let no_dependency = node.parents().is_empty();
    let diverges = node.children().len() > 1;
    let converges = distinct_targets(snapshot, node.parents()) > 1;
    no_dependency || diverges || converges
}

/// Generates macroblocks from program snapshots.
#[derive(Debug, Clone, Default)]
pub struct MacroblockGenerator {
    /// Strategy forced by configuration, bypassing selection.
    forced: Option<FormationStrategy>,
}

impl MacroblockGenerator {
    /// Create a generator that selects its strategy from each snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator that always uses `strategy`.
    pub fn with_strategy(strategy: FormationStrategy) -> Self {
        Self {
            forced: Some(strategy),
        }
    }

    pub fn from_config(config: &FormationConfig) -> Self {
        Self {
            forced: config.strategy,
        }
    }

    /// Partition `snapshot` into macroblocks.
    ///
    /// Block ids are `0..n` in creation order, every block starts `Ready`, and
    /// each scheduled node's `macroblock_id` is set to its owner. Nodes left
    /// unscheduled have their `macroblock_id` cleared.
    #[instrument(skip_all, fields(nodes = snapshot.node_count()))]
    pub fn generate(
        &self,
        snapshot: &mut ProgramSnapshot,
    ) -> Result<Vec<Macroblock>, FormationError> {
        let strategy = match self.forced {
            Some(strategy) => strategy,
            None => select_strategy(snapshot),
        };
        let blocks = match strategy {
            FormationStrategy::Default => DefaultPass::new(snapshot).run(),
            other => return Err(FormationError::UnimplementedStrategy(other)),
        };

        let mut owners = vec![None; snapshot.node_count()];
        for block in &blocks {
            for member in block.members() {
                owners[member.index()] = Some(block.id());
            }
        }
        for (i, owner) in owners.into_iter().enumerate() {
            if let Some(node) = snapshot.get_node_mut(NodeIndex::from(i)) {
                node.set_macroblock_id(owner);
            }
        }

        tracing::debug!(blocks = blocks.len(), "Formed macroblocks");
        Ok(blocks)
    }
}

/// Scratch state for one run of the default strategy.
struct DefaultPass<'a> {
    snapshot: &'a ProgramSnapshot,
    /// Visited markers, local to this pass.
    visited: Vec<bool>,
    /// Entry-point flags. These depend only on graph shape.
    entry: Vec<bool>,
    blocks: Vec<Macroblock>,
}

impl<'a> DefaultPass<'a> {
    fn new(snapshot: &'a ProgramSnapshot) -> Self {
        let entry = (0..snapshot.node_count())
            .map(|i| is_entry_point(snapshot, NodeIndex::from(i)))
            .collect();
        Self {
            snapshot,
            visited: vec![false; snapshot.node_count()],
            entry,
            blocks: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Macroblock> {
        self.diverging_pass();
        self.entry_pass();
        self.orphan_pass();
        self.blocks
    }

    /// Whether a node may be placed in any block.
    fn schedulable(&self, index: NodeIndex) -> bool {
        self.snapshot
            .get_node(index)
            .is_some_and(|node| node.is_active() && !node.is_return())
    }

    fn unvisited(&self) -> Vec<NodeIndex> {
        (0..self.visited.len())
            .filter(|&i| !self.visited[i])
            .map(NodeIndex::from)
            .collect()
    }

    fn diverging_pass(&mut self) {
        let snapshot = self.snapshot;
        for (index, node) in snapshot.iter() {
            if !node.is_active() || self.visited[index.index()] || node.children().len() <= 1 {
                continue;
            }
            for &child in node.children() {
                if self.visited[child.index()] || !self.schedulable(child) {
                    continue;
                }
                self.start_block(child);
            }
        }
    }

    fn entry_pass(&mut self) {
        // Absorption never takes entry points, so none of these can be
        // visited by an earlier block in this loop.
        for index in self.unvisited() {
            if self.schedulable(index) && self.entry[index.index()] {
                self.start_block(index);
            }
        }
    }

    fn orphan_pass(&mut self) {
        for index in self.unvisited() {
            if self.visited[index.index()] || !self.schedulable(index) {
                continue;
            }
            tracing::trace!(node = %index, "Node unreachable from any entry point");
            self.start_block(index);
        }
    }

    fn start_block(&mut self, entry: NodeIndex) {
        let id = BlockId::from(self.blocks.len());
        self.visited[entry.index()] = true;
        self.blocks.push(Macroblock::new(id, entry));
        self.absorb_chain(entry);

        if let Some(block) = self.blocks.last() {
            tracing::trace!(block = %id, entry = %entry, members = block.len(), "Built macroblock");
        }
    }

    /// Absorb every node reachable from `head` through non-entry readers.
    ///
    /// Depth-first in snapshot order: each absorbed node has its own readers
    /// absorbed before the scan from its head continues.
    fn absorb_chain(&mut self, head: NodeIndex) {
        // (chain head, snapshot position to resume scanning from)
        let mut stack = vec![(head, 0usize)];
        while let Some(&(current, start)) = stack.last() {
            match self.next_reader(current, start) {
                Some(found) => {
                    if let Some(top) = stack.last_mut() {
                        top.1 = found.index() + 1;
                    }
                    self.visited[found.index()] = true;
                    if let Some(block) = self.blocks.last_mut() {
                        block.push_member(found);
                    }
                    stack.push((found, 0));
                }
                None => {
                    stack.pop();
                }
            }
        }
    }

    /// Find the first absorbable reader of `current`'s target at or after `start`.
    fn next_reader(&self, current: NodeIndex, start: usize) -> Option<NodeIndex> {
        let target = self.snapshot.get_node(current)?.target();
        (start..self.visited.len()).map(NodeIndex::from).find(|&candidate| {
            !self.visited[candidate.index()]
                && !self.entry[candidate.index()]
                && self.schedulable(candidate)
                && self.snapshot.depends_on_target(candidate, target)
        })
    }
}
