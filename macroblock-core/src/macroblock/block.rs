//! Macroblocks
//!
//! A macroblock is a group of dependency nodes scheduled and executed as one
//! unit. Its entry node gates readiness; the remaining members are the
//! single-consumer chain formation absorbed behind it.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::grouping::are_operands_ready;
use crate::graph::{EntryPoint, NodeIndex, NodeList, ProgramSnapshot};

/// Unique identifier of a macroblock within one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(u32);

impl BlockId {
    /// Get the raw id, which is also the block's position in the formation output.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Ids are stored as `u32`; formation produces at most `u32::MAX` blocks.
impl From<usize> for BlockId {
    fn from(id: usize) -> Self {
        debug_assert!(u32::try_from(id).is_ok(), "block id {id} exceeds u32");
        Self(id as u32)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution state of a macroblock within one sequencing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecuteState {
    /// At least one input has no clean producer yet.
    NotReady,

    /// Every input has a clean producer. Also the state between passes.
    Ready,

    /// Handed to the executor.
    Executing,

    /// Executed in the current pass. Sticky until the pass ends.
    Done,

    /// Reserved. The sequencer never enters this state.
    Paused,
}

/// An executable unit anchored by an entry node.
#[derive(Debug, Clone)]
pub struct Macroblock {
    id: BlockId,
    state: ExecuteState,
    entry: NodeIndex,
    members: NodeList,
}

impl Macroblock {
    /// Create a block whose only member is its entry node.
    pub fn new(id: BlockId, entry: NodeIndex) -> Self {
        let mut members = NodeList::new();
        members.push(entry);
        Self {
            id,
            state: ExecuteState::Ready,
            entry,
            members,
        }
    }

    /// Get the block's ID.
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Get the block's state in the current pass.
    pub fn state(&self) -> ExecuteState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ExecuteState) {
        self.state = state;
    }

    /// The node whose inputs gate this block.
    pub fn entry_node(&self) -> NodeIndex {
        self.entry
    }

    /// Members in absorption order. The entry node comes first.
    pub fn members(&self) -> &[NodeIndex] {
        &self.members
    }

    /// Get the number of member nodes.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check whether the block has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn push_member(&mut self, node: NodeIndex) {
        self.members.push(node);
    }

    /// Where the executor should start this block.
    ///
    /// Returns `None` when the entry node has already run this cycle, which
    /// callers treat as "nothing to start".
    pub fn resolve_entry_point(&self, snapshot: &ProgramSnapshot) -> Option<EntryPoint> {
        snapshot
            .get_node(self.entry)
            .filter(|node| node.is_dirty())
            .map(|node| node.entry_point())
    }

    /// A block is dirty while any of its members still has to run.
    pub fn is_dirty(&self, snapshot: &ProgramSnapshot) -> bool {
        self.members
            .iter()
            .filter_map(|&member| snapshot.get_node(member))
            .any(|node| node.is_dirty())
    }

    /// Check whether every input of the entry node has a clean producer.
    pub fn are_operands_ready(&self, snapshot: &ProgramSnapshot) -> bool {
        are_operands_ready(snapshot, self.entry)
    }

    /// Recompute `Ready`/`NotReady` from live dirty state. `Done` is left alone.
    pub(crate) fn refresh_state(&mut self, snapshot: &ProgramSnapshot) -> ExecuteState {
        if self.state != ExecuteState::Done {
            self.state = if self.are_operands_ready(snapshot) {
                ExecuteState::Ready
            } else {
                ExecuteState::NotReady
            };
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (ProgramSnapshot, Macroblock) {
        let mut snapshot = ProgramSnapshot::new();
        let a = snapshot.assign("a", &[]);
        let b = snapshot.assign("b", &[a]);
        let mut block = Macroblock::new(BlockId::from(0), a);
        block.push_member(b);
        (snapshot, block)
    }

    #[test]
    fn new_block_is_ready_with_entry_member() {
        let block = Macroblock::new(BlockId::from(3), NodeIndex::from(5));
        assert_eq!(block.state(), ExecuteState::Ready);
        assert_eq!(block.members(), &[NodeIndex::from(5)]);
        assert_eq!(block.entry_node(), NodeIndex::from(5));
    }

    #[test]
    fn entry_point_only_while_entry_dirty() {
        let (snapshot, block) = chain();
        assert_eq!(block.resolve_entry_point(&snapshot), Some(EntryPoint(0)));

        snapshot.get_node(block.entry_node()).unwrap().mark_clean();
        assert_eq!(block.resolve_entry_point(&snapshot), None);
    }

    #[test]
    fn block_dirty_while_any_member_dirty() {
        let (snapshot, block) = chain();
        snapshot.get_node(block.members()[0]).unwrap().mark_clean();
        assert!(block.is_dirty(&snapshot));

        snapshot.get_node(block.members()[1]).unwrap().mark_clean();
        assert!(!block.is_dirty(&snapshot));
    }

    #[test]
    fn refresh_keeps_done_sticky() {
        let mut snapshot = ProgramSnapshot::new();
        let a = snapshot.assign("a", &[]);
        let b = snapshot.assign("b", &[a]);
        let mut block = Macroblock::new(BlockId::from(0), b);

        assert_eq!(block.refresh_state(&snapshot), ExecuteState::NotReady);

        block.set_state(ExecuteState::Done);
        assert_eq!(block.refresh_state(&snapshot), ExecuteState::Done);
    }

    #[test]
    #[cfg(all(debug_assertions, target_pointer_width = "64"))]
    #[should_panic(expected = "exceeds u32")]
    fn oversized_block_id_is_caught() {
        let _ = BlockId::from(u32::MAX as usize + 1);
    }
}
