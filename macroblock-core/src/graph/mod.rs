//! Dependency Graph
//!
//! This module holds the snapshot of the program's dependency graph that the
//! scheduler partitions and drives.
//!
//! # Overview
//!
//! Each node wraps the update of one statement:
//!
//! - Parents are the nodes whose values the statement reads
//! - Children are the nodes that read the value the statement writes
//! - The assignment target identifies the value slot the statement writes
//!
//! The graph is not required to be a DAG. Several statements may write the
//! same target (for example from different branches), and the scheduler treats
//! them as alternative producers of one value.
//!
//! # Design Decisions
//!
//! 1. Nodes live in a single arena and link to each other by index. This keeps
//!    the bidirectional parent/child links free of reference cycles.
//!
//! 2. The dirty flag is atomic. The executor clears it through a shared
//!    reference while the sequencer reads it, in serial or parallel mode.
//!
//! 3. Pass-local traversal state (visited markers) is not stored on nodes.
//!    Formation keeps it in its own scratch table.

mod node;
mod snapshot;

pub use node::{DependencyNode, EntryPoint, NodeIndex, NodeList, TargetId};
pub use snapshot::ProgramSnapshot;
