//! The fetch loop.
//!
//! One run fetches pages strictly one after another: a page's cursor is
//! only known once the previous response has been merged. Per page:
//!
//! 1. request the page for the current cursor (blank = first page)
//! 2. fail on a non-2xx status
//! 3. merge entries, refresh the rate-limit gauge, decode the cursor
//! 4. fail when the quota is exhausted
//! 5. stop, without reconciliation, once `max_entries` is reached
//! 6. on the last page, reconcile against the previous checkpoint and stop
//! 7. otherwise advance to `next`
//!
//! Every failure aborts the whole run; nothing is retried here.

use std::sync::Arc;
use std::time::Instant;

use auditsync_state::RunCheckpoint;
use serde::Serialize;
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::cursor::{decode_page_cursor, PageCursor};
use crate::error::{Result, SyncError};
use crate::obs::{
    emit_max_entries_reached, emit_page_fetched, emit_rate_limit, emit_reconciled,
    emit_sync_cancelled, emit_sync_failed, emit_sync_finished, emit_sync_started, run_span,
};
use crate::rate_limit::{RateLimitGauge, RateLimitStatus};
use crate::reconcile::{reconcile, ReconcileAction};
use crate::store::{EntryStore, LastPage};
use crate::transport::{PageRequest, PageTransport};

/// How a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunCompletion {
    /// Reached the feed's last page and reconciled it.
    Completed,
    /// Stopped mid-feed at the entry cap; no reconciliation applied.
    MaxEntriesReached,
    /// Stopped between pages on a shutdown signal.
    Cancelled,
}

/// Result of one run, consumed by the caller exactly once.
#[derive(Debug)]
pub struct SyncOutcome {
    pub run_id: String,
    pub entries: EntryStore,
    pub page_cursor: PageCursor,
    pub rate_limit: Option<RateLimitStatus>,
    pub completion: RunCompletion,
    /// Set only when the run reached the last page.
    pub reconciliation: Option<ReconcileAction>,
    pub pages_fetched: usize,
}

impl SyncOutcome {
    pub fn max_entries_reached(&self) -> bool {
        self.completion == RunCompletion::MaxEntriesReached
    }

    pub fn is_cancelled(&self) -> bool {
        self.completion == RunCompletion::Cancelled
    }

    pub fn last_page(&self) -> &LastPage {
        self.entries.last_page()
    }

    /// Checkpoint to persist for the next run.
    ///
    /// A cancelled run has no reliable anchor and yields `None`.
    pub fn next_checkpoint(&self, credential_id: &str) -> Option<RunCheckpoint> {
        if self.is_cancelled() {
            return None;
        }
        let last_page = self.last_page();
        Some(RunCheckpoint {
            pat_credential_id: credential_id.to_string(),
            page_cursor: self.page_cursor.resume_token().to_string(),
            last_document_id: last_page.identity.clone(),
            last_count: last_page.count,
        })
    }
}

/// Drives one account's fetch loop over a shared transport.
pub struct SyncOrchestrator {
    transport: Arc<dyn PageTransport>,
    config: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(transport: Arc<dyn PageTransport>, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        Ok(SyncOrchestrator { transport, config })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run to completion against the previous run's checkpoint.
    pub async fn run(&self, checkpoint: Option<&RunCheckpoint>) -> Result<SyncOutcome> {
        self.run_until(checkpoint, None).await
    }

    /// Like [`run`](Self::run), but stops between pages once `shutdown`
    /// holds `true`.
    pub async fn run_until(
        &self,
        checkpoint: Option<&RunCheckpoint>,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<SyncOutcome> {
        let run_id = Uuid::new_v4().to_string();
        let span = run_span(&self.config.account, &run_id);
        let started = Instant::now();

        let result = self
            .fetch_pages(&run_id, checkpoint, shutdown)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &result {
            Ok(outcome) => emit_sync_finished(
                &run_id,
                started.elapsed().as_millis() as u64,
                outcome.entries.total(),
                outcome.pages_fetched,
            ),
            Err(e) => emit_sync_failed(&run_id, e),
        });
        result
    }

    async fn fetch_pages(
        &self,
        run_id: &str,
        checkpoint: Option<&RunCheckpoint>,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<SyncOutcome> {
        let mut after = checkpoint
            .and_then(RunCheckpoint::resume_cursor)
            .map(str::to_string);
        emit_sync_started(run_id, &self.config.account, after.as_deref());

        let mut store = EntryStore::new();
        let mut gauge = RateLimitGauge::new();
        let mut cursor = PageCursor::default();
        let mut pages = 0usize;

        let (completion, reconciliation) = loop {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                emit_sync_cancelled(run_id, store.total());
                break (RunCompletion::Cancelled, None);
            }

            let request = PageRequest::for_cursor(&self.config, after.as_deref())?;
            let response = self.transport.get_page(&request).await?;
            let served_url = if response.url.is_empty() {
                request.url.clone()
            } else {
                response.url.clone()
            };
            if !response.is_success() {
                return Err(SyncError::UpstreamRequest {
                    status: response.status,
                    url: served_url,
                });
            }

            let batch = response.entries()?;
            let fetched = batch.len();
            store.merge(batch);
            let limits = gauge.update(&response.headers)?;
            cursor = decode_page_cursor(&response.links(), Some(&served_url))?;
            store.set_has_next_page(cursor.has_next());
            pages += 1;

            emit_page_fetched(run_id, pages, fetched, store.total(), store.has_next_page());
            emit_rate_limit(run_id, &limits);

            if gauge.is_exhausted() {
                return Err(SyncError::RateLimitExhausted {
                    reset_timestamp: limits.reset_timestamp,
                });
            }

            if store.total() >= self.config.max_entries {
                emit_max_entries_reached(run_id, store.total(), self.config.max_entries);
                break (RunCompletion::MaxEntriesReached, None);
            }

            if !store.has_next_page() {
                let action = reconcile(checkpoint, &mut store)?;
                emit_reconciled(run_id, &action, store.total());
                break (RunCompletion::Completed, Some(action));
            }

            if cursor.next == after {
                return Err(SyncError::MalformedResponse(format!(
                    "next cursor repeats the current one: {}",
                    cursor.resume_token()
                )));
            }
            after = cursor.next.clone();
        };

        Ok(SyncOutcome {
            run_id: run_id.to_string(),
            entries: store,
            page_cursor: cursor,
            rate_limit: gauge.status(),
            completion,
            reconciliation,
            pages_fetched: pages,
        })
    }
}
