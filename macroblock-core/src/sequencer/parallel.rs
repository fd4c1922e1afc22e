//! Parallel Strategy
//!
//! Blocks are dispatched in waves. Each wave is every pending block that is
//! ready at the moment the wave is formed; those blocks have no outstanding
//! input on each other, so they run concurrently on a rayon pool. The wave is
//! joined before readiness is evaluated again.
//!
//! The executor context is shared mutable state for a pass, so every block in
//! a wave runs on its own fork of the executor, with its own `setup_entry`.
//!
//! A wave that finds nothing ready while blocks are pending cannot make
//! progress and ends the pass as a stall. Readiness checks count against the
//! same `stall_factor * block_count` bound as the serial strategy.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::instrument;

use super::driver::{reset, stalled, validate, Sequencer};
use super::executor::{BlockEntry, ForkableExecutor};
use super::report::SequenceReport;
use crate::error::SequenceError;
use crate::graph::ProgramSnapshot;
use crate::macroblock::{BlockId, ExecuteState, Macroblock};

impl Sequencer {
    /// Run one pass, executing simultaneously ready blocks concurrently.
    ///
    /// `executor` itself never runs a block; it only hands out forks.
    #[instrument(skip_all, fields(blocks = blocks.len()))]
    pub fn execute_parallel<E>(
        &self,
        blocks: &mut [Macroblock],
        snapshot: &ProgramSnapshot,
        executor: &E,
        entry: &BlockEntry<E::Frame>,
    ) -> Result<SequenceReport, SequenceError>
    where
        E: ForkableExecutor,
        E::Frame: Sync,
    {
        validate(blocks, snapshot)?;
        if blocks.is_empty() {
            return Ok(SequenceReport::completed(Vec::new(), 0));
        }

        let pool = self.worker_pool()?;
        let result = self.waves(blocks, snapshot, executor, entry, pool.as_deref());
        reset(blocks);
        self.finish(result)
    }

    /// The dedicated pool for `max_workers`, or `None` to use rayon's global pool.
    ///
    /// Built on the first parallel pass and reused by every later one.
    pub(super) fn worker_pool(&self) -> Result<Option<Arc<rayon::ThreadPool>>, SequenceError> {
        let Some(workers) = self.config.max_workers else {
            return Ok(None);
        };
        let mut slot = self.pool.lock();
        if let Some(pool) = slot.as_ref() {
            return Ok(Some(pool.clone()));
        }
        let pool = Arc::new(rayon::ThreadPoolBuilder::new().num_threads(workers).build()?);
        tracing::debug!(workers, "Built sequencer worker pool");
        *slot = Some(pool.clone());
        Ok(Some(pool))
    }

    fn waves<E>(
        &self,
        blocks: &mut [Macroblock],
        snapshot: &ProgramSnapshot,
        executor: &E,
        entry: &BlockEntry<E::Frame>,
        pool: Option<&rayon::ThreadPool>,
    ) -> Result<SequenceReport, SequenceError>
    where
        E: ForkableExecutor,
        E::Frame: Sync,
    {
        let count = blocks.len();
        let limit = self.stall_limit(count);
        let mut executed = Vec::with_capacity(count);
        let mut advances = 0;

        while executed.len() < count {
            if advances >= limit {
                return Ok(stalled(blocks, executed, advances));
            }

            let mut wave = Vec::new();
            for (i, block) in blocks.iter_mut().enumerate() {
                if block.state() == ExecuteState::Done {
                    continue;
                }
                advances += 1;
                if block.refresh_state(snapshot) == ExecuteState::Ready {
                    block.set_state(ExecuteState::Executing);
                    wave.push(i);
                }
            }

            if wave.is_empty() {
                return Ok(stalled(blocks, executed, advances));
            }

            tracing::trace!(size = wave.len(), "Dispatching wave");
            let workers: Vec<E> = wave.iter().map(|_| executor.fork()).collect();
            let shared: &[Macroblock] = blocks;
            let run = || -> Vec<(BlockId, Result<(), E::Error>)> {
                workers
                    .into_par_iter()
                    .zip(wave.par_iter())
                    .map(|(mut worker, &i)| {
                        let block = &shared[i];
                        worker.setup_entry(entry);
                        (block.id(), worker.execute(block, snapshot))
                    })
                    .collect()
            };
            let results = match pool {
                Some(pool) => pool.install(run),
                None => run(),
            };

            for (&i, (id, result)) in wave.iter().zip(results) {
                result.map_err(|e| SequenceError::Executor {
                    block: id,
                    source: Box::new(e),
                })?;
                blocks[i].set_state(ExecuteState::Done);
                executed.push(id);
            }
        }

        Ok(SequenceReport::completed(executed, advances))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::config::SequencerConfig;
    use crate::graph::EntryPoint;
    use crate::macroblock::MacroblockGenerator;
    use crate::sequencer::{Executor, ExecutionStrategy, RecordingSink};

    #[derive(Debug, thiserror::Error)]
    #[error("block {0} failed")]
    struct Failed(BlockId);

    /// Forks share one log of (block, setup count seen by the fork).
    struct LoggingExecutor {
        setups: usize,
        log: Arc<Mutex<Vec<(BlockId, usize)>>>,
        fail_on: Option<BlockId>,
    }

    impl LoggingExecutor {
        fn new(log: Arc<Mutex<Vec<(BlockId, usize)>>>) -> Self {
            Self {
                setups: 0,
                log,
                fail_on: None,
            }
        }
    }

    impl Executor for LoggingExecutor {
        type Frame = usize;
        type Error = Failed;

        fn setup_entry(&mut self, _entry: &BlockEntry<usize>) {
            self.setups += 1;
        }

        fn execute(
            &mut self,
            block: &Macroblock,
            snapshot: &ProgramSnapshot,
        ) -> Result<(), Failed> {
            if self.fail_on == Some(block.id()) {
                return Err(Failed(block.id()));
            }
            for &member in block.members() {
                snapshot.get_node(member).unwrap().mark_clean();
            }
            self.log.lock().push((block.id(), self.setups));
            Ok(())
        }
    }

    impl ForkableExecutor for LoggingExecutor {
        fn fork(&self) -> Self {
            Self {
                setups: 0,
                log: self.log.clone(),
                fail_on: self.fail_on,
            }
        }
    }

    fn entry() -> BlockEntry<usize> {
        BlockEntry::new(0, EntryPoint(0), 0)
    }

    fn parallel_sequencer(workers: Option<usize>) -> Sequencer {
        let config = SequencerConfig {
            strategy: ExecutionStrategy::Parallel,
            max_workers: workers,
            ..SequencerConfig::default()
        };
        Sequencer::with_config(config, Arc::new(RecordingSink::new()))
    }

    #[test]
    fn runs_independent_blocks_in_one_wave() {
        let mut snapshot = ProgramSnapshot::new();
        for name in ["a", "b", "c", "d"] {
            snapshot.assign(name, &[]);
        }
        let mut blocks = MacroblockGenerator::new().generate(&mut snapshot).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut executor = LoggingExecutor::new(log.clone());
        let report = parallel_sequencer(Some(2))
            .dispatch(&mut blocks, &snapshot, &mut executor, &entry())
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.advances, 4);
        assert_eq!(log.lock().len(), 4);
        // Every fork set up its own context exactly once.
        assert!(log.lock().iter().all(|&(_, setups)| setups == 1));
        assert_eq!(executor.setups, 0);
    }

    #[test]
    fn dependent_blocks_wait_for_a_later_wave() {
        let mut snapshot = ProgramSnapshot::new();
        let a = snapshot.assign("a", &[]);
        snapshot.assign("b", &[a]);
        snapshot.assign("c", &[a]);
        let mut blocks = MacroblockGenerator::new().generate(&mut snapshot).unwrap();
        assert_eq!(blocks.len(), 3);

        let log = Arc::new(Mutex::new(Vec::new()));
        let executor = LoggingExecutor::new(log.clone());
        let report = parallel_sequencer(None)
            .execute_parallel(&mut blocks, &snapshot, &executor, &entry())
            .unwrap();

        assert!(report.is_complete());
        // Producer block (id 2) runs alone in the first wave.
        assert_eq!(report.executed[0], BlockId::from(2));
        assert_eq!(log.lock()[0].0, BlockId::from(2));
        assert!(blocks.iter().all(|b| b.state() == ExecuteState::Ready));
    }

    #[test]
    fn empty_wave_is_a_stall() {
        let mut snapshot = ProgramSnapshot::new();
        let x = snapshot.assign("x", &[]);
        snapshot.add_edge(x, x);
        let mut blocks = MacroblockGenerator::new().generate(&mut snapshot).unwrap();

        let sink = Arc::new(RecordingSink::new());
        let config = SequencerConfig {
            strategy: ExecutionStrategy::Parallel,
            ..SequencerConfig::default()
        };
        let executor = LoggingExecutor::new(Arc::new(Mutex::new(Vec::new())));
        let report = Sequencer::with_config(config, sink.clone())
            .execute_parallel(&mut blocks, &snapshot, &executor, &entry())
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.pending, vec![BlockId::from(0)]);
        assert_eq!(sink.messages().len(), 1);
    }

    #[test]
    fn executor_failure_in_a_wave_aborts_and_resets() {
        let mut snapshot = ProgramSnapshot::new();
        for name in ["a", "b", "c"] {
            snapshot.assign(name, &[]);
        }
        let mut blocks = MacroblockGenerator::new().generate(&mut snapshot).unwrap();

        let mut executor = LoggingExecutor::new(Arc::new(Mutex::new(Vec::new())));
        executor.fail_on = Some(BlockId::from(1));
        let err = parallel_sequencer(Some(2))
            .execute_parallel(&mut blocks, &snapshot, &executor, &entry())
            .unwrap_err();

        assert!(matches!(err, SequenceError::Executor { block, .. } if block == BlockId::from(1)));
        assert!(blocks.iter().all(|b| b.state() == ExecuteState::Ready));
    }

    #[test]
    fn stalls_when_advances_reach_the_bound() {
        // b = a listed before a = 1: the first wave runs only a, using up the
        // whole bound of 1 * 2 advances.
        let mut snapshot = ProgramSnapshot::new();
        let a = snapshot.assign("a", &[]);
        let b = snapshot.assign("b", &[a]);
        let mut blocks = vec![
            Macroblock::new(BlockId::from(0), b),
            Macroblock::new(BlockId::from(1), a),
        ];

        let config = SequencerConfig {
            stall_factor: 1,
            strategy: ExecutionStrategy::Parallel,
            max_workers: None,
        };
        let sink = Arc::new(RecordingSink::new());
        let executor = LoggingExecutor::new(Arc::new(Mutex::new(Vec::new())));
        let report = Sequencer::with_config(config, sink.clone())
            .execute_parallel(&mut blocks, &snapshot, &executor, &entry())
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.advances, 2);
        assert_eq!(report.executed, vec![BlockId::from(1)]);
        assert_eq!(report.pending, vec![BlockId::from(0)]);
        assert_eq!(sink.messages().len(), 1);
        assert!(blocks.iter().all(|b| b.state() == ExecuteState::Ready));
    }

    #[test]
    fn worker_pool_is_built_once() {
        let sequencer = parallel_sequencer(Some(2));
        let first = sequencer.worker_pool().unwrap().unwrap();
        let second = sequencer.worker_pool().unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.current_num_threads(), 2);

        assert!(parallel_sequencer(None).worker_pool().unwrap().is_none());
    }
}
