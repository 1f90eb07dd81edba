use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::checkpoint::{CheckpointStore, RunCheckpoint};
use crate::error::StateError;
use crate::StateResult;

/// Filesystem-backed checkpoint store.
///
/// Layout: `<root>/<account>_state.json`. Each account owns its own file so
/// independently scheduled accounts never contend on one record.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    /// Create a store rooted at `root`. Creates the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> StateResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Path of the state file for `account`.
    pub fn state_path(&self, account: &str) -> StateResult<PathBuf> {
        if account.is_empty()
            || account.contains(['/', '\\'])
            || account.contains("..")
        {
            return Err(StateError::InvalidAccount(account.to_string()));
        }
        Ok(self.root.join(format!("{account}_state.json")))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, account: &str) -> StateResult<Option<RunCheckpoint>> {
        let path = self.state_path(account)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state file yet");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let checkpoint = serde_json::from_str(&raw)
            .map_err(|e| StateError::Deserialization(format!("{}: {e}", path.display())))?;
        Ok(Some(checkpoint))
    }

    async fn save(&self, account: &str, checkpoint: &RunCheckpoint) -> StateResult<()> {
        let path = self.state_path(account)?;
        let data = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| StateError::Serialization(e.to_string()))?;
        let dir = self.root.clone();

        // Atomic write: temp file in the same directory, then rename.
        tokio::task::spawn_blocking(move || -> StateResult<()> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&data)?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StateError::Io(std::io::Error::other(e)))?
    }

    async fn clear(&self, account: &str) -> StateResult<()> {
        let path = self.state_path(account)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_path_is_per_account() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        let path = store.state_path("poizen-inc").unwrap();
        assert_eq!(path, dir.path().join("poizen-inc_state.json"));
    }

    #[test]
    fn state_path_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        for bad in ["", "../etc", "a/b", "a\\b"] {
            assert!(
                matches!(store.state_path(bad), Err(StateError::InvalidAccount(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
