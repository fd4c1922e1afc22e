//! Program Snapshot
//!
//! The snapshot is the arena that owns every dependency node of one program
//! version. Nodes refer to each other by `NodeIndex`, so parent and child
//! links never form owning cycles.
//!
//! Assignment targets are interned by name. Nodes writing the same name share
//! a `TargetId`, which is how the scheduler recognises alternative producers
//! of one value.

use indexmap::IndexSet;

use super::node::{DependencyNode, EntryPoint, NodeIndex, TargetId};

/// An ordered collection of dependency nodes.
#[derive(Debug, Default)]
pub struct ProgramSnapshot {
    /// All nodes, in statement order.
    nodes: Vec<DependencyNode>,

    /// Interned assignment target names. The position is the `TargetId`.
    targets: IndexSet<String>,
}

impl ProgramSnapshot {
    /// Create a new empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a target name, returning its id.
    ///
    /// Ids are `u32`, so a snapshot supports at most `u32::MAX` distinct targets.
    pub fn intern(&mut self, name: &str) -> TargetId {
        let (index, _) = self.targets.insert_full(name.to_owned());
        debug_assert!(u32::try_from(index).is_ok(), "target id {index} exceeds u32");
        TargetId::from(index as u32)
    }

    /// Get the name a target was interned under.
    pub fn target_name(&self, target: TargetId) -> Option<&str> {
        self.targets
            .get_index(target.raw() as usize)
            .map(String::as_str)
    }

    /// Add a node to the snapshot.
    pub fn add_node(&mut self, node: DependencyNode) -> NodeIndex {
        let index = NodeIndex::from(self.nodes.len());
        self.nodes.push(node);
        index
    }

    /// Add a dependency edge: `dependent` reads the value `dependency` writes.
    pub fn add_edge(&mut self, dependency: NodeIndex, dependent: NodeIndex) {
        if dependency.index() >= self.nodes.len() || dependent.index() >= self.nodes.len() {
            return;
        }
        self.nodes[dependency.index()].add_child(dependent);
        self.nodes[dependent.index()].add_parent(dependency);
    }

    /// Add a statement `name = f(parents...)`.
    ///
    /// The node's entry point is its position in the snapshot.
    pub fn assign(&mut self, name: &str, parents: &[NodeIndex]) -> NodeIndex {
        let target = self.intern(name);
        let index = self.add_node(DependencyNode::new(target, EntryPoint(self.nodes.len())));
        for &parent in parents {
            self.add_edge(parent, index);
        }
        index
    }

    /// Get a reference to a node.
    pub fn get_node(&self, index: NodeIndex) -> Option<&DependencyNode> {
        self.nodes.get(index.index())
    }

    /// Get a mutable reference to a node.
    pub fn get_node_mut(&mut self, index: NodeIndex) -> Option<&mut DependencyNode> {
        self.nodes.get_mut(index.index())
    }

    /// Iterate over all nodes with their indices, in statement order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &DependencyNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeIndex::from(i), node))
    }

    /// Check whether `node` reads any producer of `target`.
    pub fn depends_on_target(&self, node: NodeIndex, target: TargetId) -> bool {
        self.get_node(node).is_some_and(|node| {
            node.parents()
                .iter()
                .filter_map(|&parent| self.get_node(parent))
                .any(|parent| parent.target() == target)
        })
    }

    /// Mark every node dirty, starting a new execution cycle.
    pub fn mark_all_dirty(&self) {
        for node in &self.nodes {
            node.mark_dirty();
        }
    }

    /// Get the total number of nodes in the snapshot.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_reuses_ids() {
        let mut snapshot = ProgramSnapshot::new();
        let a = snapshot.intern("a");
        let b = snapshot.intern("b");

        assert_ne!(a, b);
        assert_eq!(snapshot.intern("a"), a);
        assert_eq!(snapshot.target_name(b), Some("b"));
    }

    #[test]
    fn assign_links_both_directions() {
        let mut snapshot = ProgramSnapshot::new();
        let a = snapshot.assign("a", &[]);
        let b = snapshot.assign("b", &[a]);

        assert_eq!(snapshot.node_count(), 2);
        assert_eq!(snapshot.get_node(a).unwrap().children(), &[b]);
        assert_eq!(snapshot.get_node(b).unwrap().parents(), &[a]);
        assert_eq!(snapshot.get_node(b).unwrap().entry_point(), EntryPoint(1));
    }

    #[test]
    fn edges_to_unknown_nodes_are_ignored() {
        let mut snapshot = ProgramSnapshot::new();
        let a = snapshot.assign("a", &[]);
        snapshot.add_edge(a, NodeIndex::from(9));

        assert!(snapshot.get_node(a).unwrap().children().is_empty());
    }

    #[test]
    fn target_dependency_matches_any_producer() {
        let mut snapshot = ProgramSnapshot::new();
        let a1 = snapshot.assign("a", &[]);
        let a2 = snapshot.assign("a", &[]);
        let b = snapshot.assign("b", &[a2]);

        let a_target = snapshot.get_node(a1).unwrap().target();
        assert!(snapshot.depends_on_target(b, a_target));
        assert!(!snapshot.depends_on_target(a1, a_target));
    }

    #[test]
    fn mark_all_dirty_resets_cycle() {
        let mut snapshot = ProgramSnapshot::new();
        let a = snapshot.assign("a", &[]);
        snapshot.get_node(a).unwrap().mark_clean();

        snapshot.mark_all_dirty();
        assert!(snapshot.get_node(a).unwrap().is_dirty());
    }
}
