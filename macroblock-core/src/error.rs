//! Error types for macroblock formation and sequencing.

use thiserror::Error;

use crate::graph::NodeIndex;
use crate::macroblock::{BlockId, FormationStrategy};

/// Errors raised while partitioning a snapshot into macroblocks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormationError {
    /// The selected strategy has no implementation.
    #[error("macroblock formation strategy {0:?} is not implemented")]
    UnimplementedStrategy(FormationStrategy),
}

/// Errors raised by a sequencing pass.
///
/// Stalls are not errors: they are reported through the pass report and the
/// diagnostics sink.
#[derive(Error, Debug)]
pub enum SequenceError {
    /// A block has no members.
    #[error("macroblock {0} has no member nodes")]
    EmptyBlock(BlockId),

    /// A block's entry node is not one of its members.
    #[error("entry node {entry} of macroblock {block} is not a member of it")]
    EntryNotMember {
        /// The offending block.
        block: BlockId,
        /// Its entry node.
        entry: NodeIndex,
    },

    /// A block refers to a node the snapshot does not contain.
    #[error("macroblock {block} refers to node {node} outside the snapshot")]
    UnknownNode {
        /// The offending block.
        block: BlockId,
        /// The missing node.
        node: NodeIndex,
    },

    /// The executor failed while running a block.
    #[error("executor failed on macroblock {block}: {source}")]
    Executor {
        /// The block being executed.
        block: BlockId,
        /// The executor's error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The parallel worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration document is not valid JSON for the schema.
    #[error("invalid scheduler configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is outside its accepted range.
    #[error("invalid value for {field}: {cause}")]
    Invalid {
        /// Dotted path of the field.
        field: &'static str,
        /// Why it was rejected.
        cause: String,
    },
}

/// Top-level error for the scheduler.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    Formation(#[from] FormationError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias for scheduler operations.
pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;
