//! Macroblocks
//!
//! This module partitions a program snapshot into macroblocks and answers
//! readiness questions about them.
//!
//! # Concepts
//!
//! ## Macroblock
//!
//! A group of dependency nodes that is scheduled and executed as one unit.
//! The entry node gates the block: the block may run once every value the
//! entry node reads has been produced in the current cycle.
//!
//! ## Formation
//!
//! Formation walks the snapshot once and assigns every schedulable node to
//! exactly one block. Fan-out and fan-in nodes become block boundaries, and
//! single-consumer chains are folded behind them.
//!
//! ## OR-readiness
//!
//! A value may have several candidate producers. Parents are grouped by the
//! target they write, and one clean producer per group is enough.

mod block;
mod formation;
mod grouping;

pub use block::{BlockId, ExecuteState, Macroblock};
pub use formation::{is_entry_point, select_strategy, FormationStrategy, MacroblockGenerator};
pub use grouping::{are_operands_ready, distinct_targets, group_by_target, is_group_ready};
