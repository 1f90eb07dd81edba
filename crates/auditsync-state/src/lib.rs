//! Auditsync-State: checkpoint persistence between synchronisation runs
//!
//! A run reads the previous [`RunCheckpoint`] before its first request and
//! writes a new one only after it has forwarded every entry. Nothing in this
//! crate is touched mid-run.
//!
//! ## Key Components
//!
//! - `CheckpointStore`: async persistence trait, keyed by account
//! - `FileCheckpointStore`: one JSON state file per account
//! - `fakes::MemoryCheckpointStore`: in-memory store for tests

mod checkpoint;
mod error;
pub mod fakes;
mod file_store;

pub use checkpoint::{credential_fingerprint, CheckpointStore, RunCheckpoint};
pub use error::StateError;
pub use file_store::FileCheckpointStore;

/// Result type for checkpoint operations
pub type StateResult<T> = std::result::Result<T, StateError>;
