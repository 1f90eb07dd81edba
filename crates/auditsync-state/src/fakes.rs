//! In-memory fakes for checkpoint storage (testing only)

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::checkpoint::{CheckpointStore, RunCheckpoint};
use crate::StateResult;

/// In-memory checkpoint store backed by a `HashMap<account, checkpoint>`.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: Mutex<HashMap<String, RunCheckpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with an existing checkpoint.
    pub fn with_checkpoint(account: &str, checkpoint: RunCheckpoint) -> Self {
        let store = Self::default();
        store
            .records
            .lock()
            .unwrap()
            .insert(account.to_string(), checkpoint);
        store
    }

    /// Number of accounts with a stored checkpoint.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, account: &str) -> StateResult<Option<RunCheckpoint>> {
        let records = self.records.lock().unwrap();
        Ok(records.get(account).cloned())
    }

    async fn save(&self, account: &str, checkpoint: &RunCheckpoint) -> StateResult<()> {
        let mut records = self.records.lock().unwrap();
        records.insert(account.to_string(), checkpoint.clone());
        Ok(())
    }

    async fn clear(&self, account: &str) -> StateResult<()> {
        let mut records = self.records.lock().unwrap();
        records.remove(account);
        Ok(())
    }
}
