//! Macroblock Core
//!
//! This crate provides the incremental execution scheduler of an associative
//! (dataflow) language runtime. It implements:
//!
//! - Macroblock formation: partitioning a dependency graph snapshot into
//!   executable units
//! - OR-readiness: a value with several candidate producers is available as
//!   soon as any one of them has run
//! - Sequencing: driving the units to completion in dependency order, with a
//!   hard bound on wasted work for unsatisfiable graphs
//!
//! The bytecode compiler that builds the graph and the interpreter that runs
//! each block are external collaborators. The interpreter plugs in through the
//! [`sequencer::Executor`] trait.
//!
//! # Architecture
//!
//! - `graph`: Dependency nodes and the snapshot arena
//! - `macroblock`: Blocks, target grouping and formation
//! - `sequencer`: Pass driver, executor contract and diagnostics
//! - `config`: JSON-loadable scheduler settings
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use macroblock_core::graph::ProgramSnapshot;
//! use macroblock_core::macroblock::MacroblockGenerator;
//! use macroblock_core::sequencer::{BlockEntry, Sequencer, TracingSink};
//!
//! // a = 1; b = a;
//! let mut snapshot = ProgramSnapshot::new();
//! let a = snapshot.assign("a", &[]);
//! snapshot.assign("b", &[a]);
//!
//! // Once per edit cycle
//! let mut blocks = MacroblockGenerator::new().generate(&mut snapshot)?;
//!
//! // Once per execution cycle
//! let sequencer = Sequencer::new(Arc::new(TracingSink));
//! let report = sequencer.execute(&mut blocks, &snapshot, &mut interpreter, &entry)?;
//! assert!(report.is_complete());
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod macroblock;
pub mod sequencer;

pub use config::SchedulerConfig;
pub use error::{Result, SchedulerError};
