//! Suicide Mission Enumerator
//!
//! Exhaustive, resumable enumeration of every decision path through the final
//! mission of Mass Effect 2. Each path is packed into a 62-bit traversal code,
//! resolved to a 27-bit outcome code, and tallied per outcome. Progress is
//! checkpointed so a run spanning billions of leaves can stop and continue.
//!
//! This crate has no terminal or platform dependencies; the command-line
//! front end lives in `suicide-mission-cli`.

pub mod aggregate;
pub mod ally;
pub mod casualty;
pub mod checkpoint;
pub mod codec;
pub mod config;
pub mod defense;
pub mod outcome;
pub mod run;
pub mod tree;

// Re-export commonly used types
pub use aggregate::{AggregateRecord, Aggregator};
pub use ally::{Ally, AllyParseError};
pub use casualty::{Fate, resolve};
pub use checkpoint::{Checkpoint, CheckpointError, FileStore, MemoryStore};
pub use codec::{CodecError, OutcomeCode, Traversal, TraversalCode};
pub use config::{ConfigError, RunConfig};
pub use outcome::{CrewSurvival, Outcome};
pub use run::{PauseReason, RunError, RunReport, RunStatus, Runner};
pub use tree::{
    Context, Cursor, CursorError, CursorFrame, EngineError, Leaf, Pin, Scope, Step, Team, Walk,
    replay, replay_code,
};

/// Trait for abstracting checkpoint persistence.
/// The run driver only ever talks to storage through this.
pub trait CheckpointStore {
    /// Persist a checkpoint, replacing the previous one
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be encoded or written.
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Load the latest checkpoint, `None` when nothing was saved yet
    ///
    /// # Errors
    ///
    /// Returns `CheckpointError::Corrupt` or `CheckpointError::UnsupportedVersion`
    /// for unreadable data, and `CheckpointError::Io` when storage fails.
    fn load(&self) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Remove any saved checkpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be deleted.
    fn clear(&mut self) -> Result<(), CheckpointError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Store that fails every write.
    struct ReadOnlyStore {
        loads: RefCell<usize>,
    }

    impl CheckpointStore for ReadOnlyStore {
        fn save(&mut self, _checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }

        fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
            *self.loads.borrow_mut() += 1;
            Ok(None)
        }

        fn clear(&mut self) -> Result<(), CheckpointError> {
            Ok(())
        }
    }

    #[test]
    fn storage_failures_surface_as_run_errors() {
        let store = ReadOnlyStore {
            loads: RefCell::new(0),
        };
        let config = RunConfig {
            leaf_budget: Some(1),
            scope: Scope::full()
                .with_recruits(Ally::GRUNT | Ally::KASUMI | Ally::LEGION)
                .with_loyalty(Ally::NOBODY)
                .with_upgrades(true, true, true),
            ..RunConfig::default()
        };
        let mut runner = Runner::new(store, config);
        let err = runner
            .run(&std::sync::atomic::AtomicBool::new(false))
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::Checkpoint(CheckpointError::Io(_))
        ));
        assert_eq!(*runner.store().loads.borrow(), 1);
    }

    #[test]
    fn reexports_cover_a_full_replay() {
        let mut walk = Walk::new(
            Scope::full()
                .with_recruits(Ally::GRUNT | Ally::KASUMI | Ally::LEGION)
                .with_loyalty(Ally::NOBODY)
                .with_upgrades(true, true, true),
        );
        let leaf = walk.next().unwrap().unwrap();
        let outcome = replay_code(leaf.traversal).unwrap();
        assert_eq!(outcome.encode(), leaf.outcome);
    }
}
