//! Structured observability hooks for synchronisation runs.
//!
//! Every run is wrapped in a `auditsync.run` span carrying the account and
//! run id; the `emit_*` functions log lifecycle events with an `event` field
//! so they can be filtered in aggregated logs.

use tracing::{info, warn, Span};

use crate::rate_limit::RateLimitStatus;
use crate::reconcile::ReconcileAction;

/// Span for one run. Attach with `tracing::Instrument::instrument`.
pub fn run_span(account: &str, run_id: &str) -> Span {
    tracing::info_span!("auditsync.run", account = %account, run_id = %run_id)
}

pub fn emit_sync_started(run_id: &str, account: &str, resume_cursor: Option<&str>) {
    info!(
        event = "sync.started",
        run_id = %run_id,
        account = %account,
        resume_cursor = resume_cursor.unwrap_or(""),
    );
}

pub fn emit_page_fetched(run_id: &str, page: usize, fetched: usize, total: usize, has_next: bool) {
    info!(
        event = "sync.page_fetched",
        run_id = %run_id,
        page = page,
        fetched = fetched,
        total = total,
        has_next = has_next,
    );
}

pub fn emit_rate_limit(run_id: &str, status: &RateLimitStatus) {
    info!(
        event = "sync.rate_limit",
        run_id = %run_id,
        limit = status.limit,
        remaining = status.remaining,
        used = status.used,
        reset_timestamp = status.reset_timestamp,
    );
}

/// Emit event: last page reconciled against the previous checkpoint.
pub fn emit_reconciled(run_id: &str, action: &ReconcileAction, remaining: usize) {
    info!(
        event = "sync.reconciled",
        run_id = %run_id,
        action = %action,
        remaining = remaining,
    );
}

pub fn emit_max_entries_reached(run_id: &str, total: usize, max_entries: usize) {
    info!(
        event = "sync.max_entries_reached",
        run_id = %run_id,
        total = total,
        max_entries = max_entries,
    );
}

pub fn emit_sync_cancelled(run_id: &str, total: usize) {
    warn!(event = "sync.cancelled", run_id = %run_id, discarded = total);
}

pub fn emit_sync_finished(run_id: &str, duration_ms: u64, entries: usize, pages: usize) {
    info!(
        event = "sync.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        entries = entries,
        pages = pages,
    );
}

/// Emit event: run aborted (warning level). No checkpoint follows.
pub fn emit_sync_failed(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "sync.failed", run_id = %run_id, error = %error);
}

pub fn emit_checkpoint_saved(account: &str, page_cursor: &str, last_count: usize) {
    info!(
        event = "sync.checkpoint_saved",
        account = %account,
        page_cursor = %page_cursor,
        last_count = last_count,
    );
}
