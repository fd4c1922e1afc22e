//! Target Grouping and Readiness
//!
//! A value may be written by more than one statement, for instance from both
//! arms of a conditional:
//!
//! ```text
//! a = 1;
//! b = a;   // parents of b: both writers of a
//! a = 2;
//! ```
//!
//! Readiness is therefore evaluated per assignment target rather than per
//! parent node. Parents are grouped by the target they write. A node is ready
//! when every group has at least one clean member: AND across inputs, OR across
//! the producers of one input.

use indexmap::IndexMap;

use crate::graph::{NodeIndex, ProgramSnapshot, TargetId};

/// Group `nodes` by the target they write.
///
/// Groups appear in the order their first member appears in `nodes`, and
/// members keep their relative order. Indices missing from the snapshot are
/// skipped.
pub fn group_by_target(snapshot: &ProgramSnapshot, nodes: &[NodeIndex]) -> Vec<Vec<NodeIndex>> {
    let mut groups: IndexMap<TargetId, Vec<NodeIndex>> = IndexMap::new();
    for &index in nodes {
        if let Some(node) = snapshot.get_node(index) {
            groups.entry(node.target()).or_default().push(index);
        }
    }
    groups.into_values().collect()
}

/// Count the distinct targets written by `nodes`.
pub fn distinct_targets(snapshot: &ProgramSnapshot, nodes: &[NodeIndex]) -> usize {
    let mut seen: Vec<TargetId> = Vec::with_capacity(nodes.len());
    for node in nodes.iter().filter_map(|&index| snapshot.get_node(index)) {
        if !seen.contains(&node.target()) {
            seen.push(node.target());
        }
    }
    seen.len()
}

/// A group is ready once any of its producers has executed.
pub fn is_group_ready(snapshot: &ProgramSnapshot, group: &[NodeIndex]) -> bool {
    group
        .iter()
        .filter_map(|&index| snapshot.get_node(index))
        .any(|node| !node.is_dirty())
}

/// Check whether every input of `node` has at least one clean producer.
///
/// A node without parents is a direct input (such as `a = 1`) and is always
/// ready. A node missing from the snapshot is never ready.
pub fn are_operands_ready(snapshot: &ProgramSnapshot, node: NodeIndex) -> bool {
    let Some(node) = snapshot.get_node(node) else {
        return false;
    };

    if node.parents().is_empty() {
        return true;
    }

    group_by_target(snapshot, node.parents())
        .iter()
        .all(|group| is_group_ready(snapshot, group))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_preserve_first_seen_order() {
        let mut snapshot = ProgramSnapshot::new();
        let a1 = snapshot.assign("a", &[]);
        let b = snapshot.assign("b", &[]);
        let a2 = snapshot.assign("a", &[]);

        let groups = group_by_target(&snapshot, &[a1, b, a2]);
        assert_eq!(groups, vec![vec![a1, a2], vec![b]]);
        assert_eq!(distinct_targets(&snapshot, &[a1, b, a2]), 2);
    }

    #[test]
    fn direct_input_is_ready() {
        let mut snapshot = ProgramSnapshot::new();
        let a = snapshot.assign("a", &[]);
        assert!(are_operands_ready(&snapshot, a));
    }

    #[test]
    fn either_producer_satisfies_input() {
        let mut snapshot = ProgramSnapshot::new();
        let b1 = snapshot.assign("a", &[]);
        let b2 = snapshot.assign("a", &[]);
        let c = snapshot.assign("c", &[b1, b2]);

        assert!(!are_operands_ready(&snapshot, c));

        snapshot.get_node(b2).unwrap().mark_clean();
        assert!(are_operands_ready(&snapshot, c));

        snapshot.mark_all_dirty();
        snapshot.get_node(b1).unwrap().mark_clean();
        assert!(are_operands_ready(&snapshot, c));
    }

    #[test]
    fn every_input_needs_a_producer() {
        let mut snapshot = ProgramSnapshot::new();
        let a = snapshot.assign("a", &[]);
        let b = snapshot.assign("b", &[]);
        let c = snapshot.assign("c", &[a, b]);

        snapshot.get_node(a).unwrap().mark_clean();
        assert!(!are_operands_ready(&snapshot, c));

        snapshot.get_node(b).unwrap().mark_clean();
        assert!(are_operands_ready(&snapshot, c));
    }

    #[test]
    fn unknown_node_is_not_ready() {
        let snapshot = ProgramSnapshot::new();
        assert!(!are_operands_ready(&snapshot, NodeIndex::from(0)));
    }
}
