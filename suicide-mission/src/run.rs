//! The resumable enumeration loop.

use crate::CheckpointStore;
use crate::checkpoint::{Checkpoint, CheckpointError};
use crate::config::{ConfigError, RunConfig};
use crate::tree::{CursorError, EngineError, Scope, Walk};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error("enumeration stopped: {0}")]
    Engine(#[from] EngineError),
    #[error("checkpoint covers {saved}, but this run is configured for {configured}")]
    ScopeMismatch { saved: Scope, configured: Scope },
}

/// Why a run stopped before the tree was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    Signal,
    LeafBudget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Complete,
    Paused(PauseReason),
}

impl RunStatus {
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Summary of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub status: RunStatus,
    pub leaves_this_run: u64,
    pub total_leaves: u64,
    pub outcomes: usize,
    pub digest: u64,
    pub elapsed: Duration,
}

impl RunReport {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn leaves_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.leaves_this_run as f64 / secs
        } else {
            0.0
        }
    }
}

/// Walks the configured scope, persisting progress through a store.
#[derive(Debug)]
pub struct Runner<S: CheckpointStore> {
    store: S,
    config: RunConfig,
}

impl<S: CheckpointStore> Runner<S> {
    pub const fn new(store: S, config: RunConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }

    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Continues the enumeration until the tree is exhausted, `interrupt` is
    /// raised, or the leaf budget runs out. Progress is saved before
    /// returning in every case but an error.
    ///
    /// # Errors
    ///
    /// Returns `RunError` for invalid configuration, a checkpoint written for
    /// another scope, storage failures, and engine inconsistencies. An engine
    /// error leaves the last saved checkpoint untouched.
    pub fn run(&mut self, interrupt: &AtomicBool) -> Result<RunReport, RunError> {
        let started = Instant::now();
        self.config.validate()?;
        let (mut checkpoint, mut walk) = self.restore()?;

        if checkpoint.is_complete() {
            info!(
                "enumeration already complete: {} leaves, {} outcomes",
                checkpoint.leaves,
                checkpoint.aggregator.len()
            );
            return Ok(report(&checkpoint, RunStatus::Complete, 0, started));
        }

        let save_every = self.config.save_every_leaves;
        let budget = self.config.leaf_budget;
        let mut this_run = 0u64;
        let mut since_save = 0u64;

        let status = loop {
            let Some(leaf) = walk.next() else {
                break RunStatus::Complete;
            };
            let leaf = leaf?;
            checkpoint.aggregator.record(leaf.outcome, leaf.traversal);
            checkpoint.leaves += 1;
            this_run += 1;
            since_save += 1;

            if interrupt.load(Ordering::Relaxed) {
                break RunStatus::Paused(PauseReason::Signal);
            }
            if budget.is_some_and(|limit| this_run >= limit) {
                break RunStatus::Paused(PauseReason::LeafBudget);
            }
            if since_save >= save_every {
                checkpoint.cursor = walk.cursor();
                self.save(&checkpoint)?;
                since_save = 0;
            }
        };

        checkpoint.cursor = walk.cursor();
        self.save(&checkpoint)?;
        let report = report(&checkpoint, status, this_run, started);
        match status {
            RunStatus::Complete => info!(
                "enumeration complete: {} leaves, {} outcomes, digest {:016x}",
                report.total_leaves, report.outcomes, report.digest
            ),
            RunStatus::Paused(reason) => info!(
                "paused ({reason:?}) after {} leaves this run, {} in total",
                report.leaves_this_run, report.total_leaves
            ),
        }
        Ok(report)
    }

    fn restore(&self) -> Result<(Checkpoint, Walk), RunError> {
        let scope = self.config.scope.clone();
        let loaded = match self.store.load() {
            Ok(loaded) => loaded,
            Err(err) if err.is_recoverable() => {
                warn!("discarding unreadable checkpoint: {err}");
                None
            }
            Err(err) => return Err(err.into()),
        };

        let Some(checkpoint) = loaded else {
            info!("starting a fresh enumeration over {scope}");
            return Ok((Checkpoint::fresh(scope.clone()), Walk::new(scope)));
        };
        if checkpoint.scope != scope {
            return Err(RunError::ScopeMismatch {
                saved: checkpoint.scope,
                configured: scope,
            });
        }

        let resumed = Walk::resume(scope, &checkpoint.cursor);
        continue_from(checkpoint, resumed)
    }

    fn save(&mut self, checkpoint: &Checkpoint) -> Result<(), RunError> {
        self.store.save(checkpoint)?;
        debug!(
            "checkpoint saved at {} leaves ({} outcomes)",
            checkpoint.leaves,
            checkpoint.aggregator.len()
        );
        Ok(())
    }
}

/// Picks up a resumed walk. A malformed cursor restarts from zero; an engine
/// failure while replaying it is fatal and leaves the saved data alone.
fn continue_from(
    checkpoint: Checkpoint,
    resumed: Result<Walk, CursorError>,
) -> Result<(Checkpoint, Walk), RunError> {
    match resumed {
        Ok(walk) => {
            info!(
                "resuming after {} leaves ({} outcomes)",
                checkpoint.leaves,
                checkpoint.aggregator.len()
            );
            Ok((checkpoint, walk))
        }
        Err(CursorError::Engine(err)) => Err(RunError::Engine(err)),
        Err(err @ (CursorError::Length { .. }
        | CursorError::StepOrder { .. }
        | CursorError::NotACandidate { .. })) => {
            warn!("discarding checkpoint with an unusable cursor: {err}");
            let scope = checkpoint.scope;
            Ok((Checkpoint::fresh(scope.clone()), Walk::new(scope)))
        }
    }
}

fn report(checkpoint: &Checkpoint, status: RunStatus, this_run: u64, started: Instant) -> RunReport {
    RunReport {
        status,
        leaves_this_run: this_run,
        total_leaves: checkpoint.leaves,
        outcomes: checkpoint.aggregator.len(),
        digest: checkpoint.aggregator.digest(),
        elapsed: started.elapsed(),
    }
}
