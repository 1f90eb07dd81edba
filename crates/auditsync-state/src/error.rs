//! Error types for auditsync-state

use thiserror::Error;

/// Errors that can occur while reading or writing run checkpoints
#[derive(Error, Debug)]
pub enum StateError {
    /// Underlying filesystem error
    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Deserialization error (corrupt or foreign state file)
    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    /// Account name cannot be mapped to a state file
    #[error("Invalid account name: {0:?}")]
    InvalidAccount(String),
}
