//! One complete run for one account: checkpoint in, events out, checkpoint
//! back.
//!
//! The sink only sees entries of a run that finished without error, and the
//! new checkpoint is written only after every entry has been handed over.

use std::sync::Arc;

use auditsync_state::{CheckpointStore, RunCheckpoint};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::error::Result;
use crate::obs::emit_checkpoint_saved;
use crate::orchestrator::{RunCompletion, SyncOrchestrator};
use crate::rate_limit::RateLimitStatus;
use crate::reconcile::ReconcileAction;
use crate::sink::EventSink;

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub completion: RunCompletion,
    /// Entries handed to the sink.
    pub forwarded: usize,
    pub pages_fetched: usize,
    pub reconciliation: Option<ReconcileAction>,
    pub rate_limit: Option<RateLimitStatus>,
    /// Checkpoint written for the next run, if any.
    pub checkpoint: Option<RunCheckpoint>,
}

pub struct SyncRunner {
    orchestrator: SyncOrchestrator,
    store: Arc<dyn CheckpointStore>,
}

impl SyncRunner {
    pub fn new(orchestrator: SyncOrchestrator, store: Arc<dyn CheckpointStore>) -> Self {
        SyncRunner {
            orchestrator,
            store,
        }
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    /// Load the checkpoint, run, forward entries and persist the new
    /// checkpoint.
    ///
    /// A cancelled run forwards nothing and leaves the stored checkpoint
    /// untouched, so the next run re-fetches the same range.
    pub async fn run_once(
        &self,
        sink: &mut (dyn EventSink + Send),
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<RunReport> {
        let config = self.orchestrator.config();
        let account = config.account.as_str();
        let credential_id = config.credential_id();

        let previous = self.store.load(account).await?;
        if let Some(prev) = &previous {
            if !prev.pat_credential_id.is_empty() && prev.pat_credential_id != credential_id {
                info!(account = %account, "access token changed since the previous run");
            }
        }

        let outcome = self
            .orchestrator
            .run_until(previous.as_ref(), shutdown)
            .await?;

        let mut report = RunReport {
            run_id: outcome.run_id.clone(),
            completion: outcome.completion,
            forwarded: 0,
            pages_fetched: outcome.pages_fetched,
            reconciliation: outcome.reconciliation,
            rate_limit: outcome.rate_limit,
            checkpoint: None,
        };
        if outcome.is_cancelled() {
            return Ok(report);
        }

        for entry in &outcome.entries {
            sink.write_entry(entry)?;
            report.forwarded += 1;
        }
        sink.flush()?;

        if let Some(checkpoint) = outcome.next_checkpoint(&credential_id) {
            self.store.save(account, &checkpoint).await?;
            emit_checkpoint_saved(account, &checkpoint.page_cursor, checkpoint.last_count);
            report.checkpoint = Some(checkpoint);
        }
        Ok(report)
    }
}
