//! Executor Contract
//!
//! The executor is the bytecode interpreter that actually runs a block's
//! updates. The sequencer only decides when each block runs.

use crate::graph::{EntryPoint, ProgramSnapshot};
use crate::macroblock::Macroblock;

/// Execution context established once per pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry<F> {
    /// Code block or function being executed.
    pub exe_block: usize,
    /// Where execution of the enclosing block starts.
    pub entry: EntryPoint,
    /// Call frame descriptor, opaque to the sequencer.
    pub frame: F,
    /// Local variable slots to reserve.
    pub locals: usize,
}

impl<F> BlockEntry<F> {
    /// Create an entry context with no local slots.
    pub fn new(exe_block: usize, entry: EntryPoint, frame: F) -> Self {
        Self {
            exe_block,
            entry,
            frame,
            locals: 0,
        }
    }

    /// Reserve `locals` local variable slots.
    pub fn with_locals(mut self, locals: usize) -> Self {
        self.locals = locals;
        self
    }
}

/// Runs macroblocks on behalf of the sequencer.
///
/// `execute` must run every member's update and clear the dirty flag of each
/// node it ran. The sequencer never touches dirty flags: readiness of later
/// blocks depends entirely on the executor doing so.
pub trait Executor {
    /// Call frame descriptor type.
    type Frame;

    /// Error raised when a block fails to run.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Establish the execution context for the pass.
    fn setup_entry(&mut self, entry: &BlockEntry<Self::Frame>);

    /// Run every member of `block`.
    fn execute(
        &mut self,
        block: &Macroblock,
        snapshot: &ProgramSnapshot,
    ) -> Result<(), Self::Error>;
}

/// An executor that can hand out isolated copies of itself.
///
/// The parallel strategy gives each concurrently running block its own fork,
/// so forks must not share frame or local state with each other.
pub trait ForkableExecutor: Executor + Send + Sized {
    /// Create an executor with its own execution context.
    fn fork(&self) -> Self;
}
