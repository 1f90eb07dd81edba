//! Checkpoint record and storage trait
//!
//! A checkpoint anchors the next run: the cursor to resume from, plus the
//! identity of the final entry and the size of the final page the previous
//! run saw. The last two drive duplicate-page reconciliation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::StateResult;

/// Persisted state carried from one run to the next.
///
/// All fields default to empty so that a blank state file reads as "no
/// previous run".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCheckpoint {
    /// Fingerprint of the credential used by the run that wrote this record.
    #[serde(default)]
    pub pat_credential_id: String,
    /// Cursor token to resume from (empty = start of feed).
    #[serde(default)]
    pub page_cursor: String,
    /// Identity of the final entry on the previous run's last page.
    #[serde(default)]
    pub last_document_id: String,
    /// Number of entries on the previous run's last page.
    #[serde(default)]
    pub last_count: usize,
}

impl RunCheckpoint {
    /// True when the record carries a last-page anchor usable for
    /// reconciliation.
    pub fn has_anchor(&self) -> bool {
        !self.last_document_id.is_empty()
    }

    /// Cursor to resume from, or `None` to start at the first page.
    pub fn resume_cursor(&self) -> Option<&str> {
        if self.page_cursor.is_empty() {
            None
        } else {
            Some(&self.page_cursor)
        }
    }
}

/// Stable fingerprint of an API host and access token.
///
/// Stored in place of the token itself so a changed token can be detected
/// without ever persisting the secret.
pub fn credential_fingerprint(host: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(host.as_bytes());
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Checkpoint persistence, keyed by account name.
///
/// Guarantees:
/// - `load` after `save` returns the saved record.
/// - `load` for an account never saved returns `Ok(None)`.
/// - Accounts never share a record.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the checkpoint for `account`, if one exists.
    async fn load(&self, account: &str) -> StateResult<Option<RunCheckpoint>>;

    /// Replace the checkpoint for `account`.
    async fn save(&self, account: &str, checkpoint: &RunCheckpoint) -> StateResult<()>;

    /// Forget the checkpoint for `account`. No-op if absent.
    async fn clear(&self, account: &str) -> StateResult<()>;
}
