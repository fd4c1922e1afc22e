//! Scheduler Configuration
//!
//! Configuration is a small JSON document. Every field is optional:
//!
//! ```json
//! {
//!   "formation": { "strategy": "default" },
//!   "sequencer": { "stall_factor": 10, "strategy": "serial", "max_workers": 4 }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::macroblock::FormationStrategy;
use crate::sequencer::ExecutionStrategy;

/// Default multiple of the block count after which a pass is declared stalled.
pub const DEFAULT_STALL_FACTOR: usize = 10;

/// Top-level scheduler configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub formation: FormationConfig,
    pub sequencer: SequencerConfig,
}

/// Formation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationConfig {
    /// Force a partitioning strategy instead of selecting one per snapshot.
    pub strategy: Option<FormationStrategy>,
}

/// Sequencing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// A pass stalls after `stall_factor * block_count` cursor advances.
    pub stall_factor: usize,

    /// Serial round-robin or parallel waves.
    pub strategy: ExecutionStrategy,

    /// Worker threads for the parallel strategy. `None` uses the global pool.
    pub max_workers: Option<usize>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            stall_factor: DEFAULT_STALL_FACTOR,
            strategy: ExecutionStrategy::Serial,
            max_workers: None,
        }
    }
}

impl SchedulerConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sequencer.stall_factor == 0 {
            return Err(ConfigError::Invalid {
                field: "sequencer.stall_factor",
                cause: "must be at least 1".to_string(),
            });
        }
        if self.sequencer.max_workers == Some(0) {
            return Err(ConfigError::Invalid {
                field: "sequencer.max_workers",
                cause: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }
}
