//! Macroblock Sequencer
//!
//! The sequencer runs every execution cycle against the block list produced
//! by formation. It decides, from live dirty state, which blocks are ready,
//! hands them to the executor, and tracks their per-pass state:
//!
//! ```text
//! NotReady -> Ready -> Executing -> Done
//! ```
//!
//! `Done` is sticky for the rest of the pass. When the pass ends, normally or
//! by stalling, every block goes back to `Ready`.
//!
//! # Ownership
//!
//! Each phase owns its own transient fields: the sequencer owns block states,
//! the executor owns node dirty flags. The sequencer never clears a dirty
//! flag itself.
//!
//! # Strategies
//!
//! Serial round-robin is the default. The parallel strategy runs blocks that
//! are ready at the same time on isolated executor forks.

mod diagnostics;
mod driver;
mod executor;
mod parallel;
mod report;

pub use diagnostics::{DiagnosticSink, RecordingSink, TracingSink};
pub use driver::{ExecutionStrategy, Sequencer};
pub use executor::{BlockEntry, Executor, ForkableExecutor};
pub use report::{PassOutcome, SequenceReport};
