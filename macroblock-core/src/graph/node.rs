//! Graph Nodes
//!
//! This module defines the dependency nodes that make up a program snapshot.
//! Nodes are produced by the graph builder; the scheduler only reads their
//! links and flags, and the executor clears their dirty flag.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::macroblock::BlockId;

/// Index of a node in the snapshot arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(u32);

impl NodeIndex {
    /// Get the raw arena position.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Arena positions are stored as `u32`; a snapshot holds at most `u32::MAX` nodes.
impl From<usize> for NodeIndex {
    fn from(index: usize) -> Self {
        debug_assert!(u32::try_from(index).is_ok(), "node index {index} exceeds u32");
        Self(index as u32)
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Interned identity of the value slot a node writes.
///
/// Two nodes with the same target are interchangeable producers of that value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(u32);

impl TargetId {
    /// Get the raw interned id.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl From<u32> for TargetId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Opaque reference to where the executor starts running a node's update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryPoint(pub usize);

/// Node index list. Most statements read and feed only a handful of values.
pub type NodeList = SmallVec<[NodeIndex; 4]>;

/// A dependency-tracked statement update.
#[derive(Debug)]
pub struct DependencyNode {
    /// Value slot written by this node.
    target: TargetId,

    /// Nodes whose values this node reads (operands).
    parents: NodeList,

    /// Nodes that read this node's value (consumers).
    children: NodeList,

    /// True until the node's update has run in the current cycle.
    ///
    /// Atomic so the executor can clear it through a shared snapshot,
    /// including from worker threads in parallel mode.
    dirty: AtomicBool,

    /// Inactive nodes are excluded from scheduling entirely.
    active: bool,

    /// Function or closure return marker. Never an entry point.
    is_return: bool,

    /// Owning macroblock, written by formation.
    macroblock_id: Option<BlockId>,

    /// Where the executor starts this node's update.
    entry_point: EntryPoint,
}

impl DependencyNode {
    /// Create a new active, dirty node writing `target`.
    pub fn new(target: TargetId, entry_point: EntryPoint) -> Self {
        Self {
            target,
            parents: NodeList::new(),
            children: NodeList::new(),
            dirty: AtomicBool::new(true),
            active: true,
            is_return: false,
            macroblock_id: None,
            entry_point,
        }
    }

    /// Mark this node as a return node.
    pub fn returning(mut self) -> Self {
        self.is_return = true;
        self
    }

    /// Mark this node as inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Get the value slot this node writes.
    pub fn target(&self) -> TargetId {
        self.target
    }

    /// Get the nodes this node reads from.
    pub fn parents(&self) -> &[NodeIndex] {
        &self.parents
    }

    /// Get the nodes that read this node's value.
    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }

    /// Check whether the node takes part in scheduling.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Include or exclude the node from scheduling.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Check whether this is a function or closure return node.
    pub fn is_return(&self) -> bool {
        self.is_return
    }

    /// Get where the executor starts this node's update.
    pub fn entry_point(&self) -> EntryPoint {
        self.entry_point
    }

    /// Get the owning macroblock, if formation placed this node in one.
    pub fn macroblock_id(&self) -> Option<BlockId> {
        self.macroblock_id
    }

    pub(crate) fn set_macroblock_id(&mut self, id: Option<BlockId>) {
        self.macroblock_id = id;
    }

    /// Check whether the node still has to run this cycle.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Mark the node as executed for the current cycle.
    ///
    /// This is the executor's side of the contract; the sequencer never calls it.
    pub fn mark_clean(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// Mark the node as needing to run again.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub(crate) fn add_parent(&mut self, parent: NodeIndex) {
        if !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
    }

    pub(crate) fn add_child(&mut self, child: NodeIndex) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }
}
