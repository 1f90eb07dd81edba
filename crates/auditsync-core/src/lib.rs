//! Auditsync Core Library
//!
//! Incrementally pulls a paginated audit event feed and hands each event to a
//! sink exactly once, even though the upstream API gives no stable page
//! boundary between polling runs.
//!
//! ## Key Components
//!
//! - `Entry`: one schema-less audit event with a stable identity
//! - `RateLimitGauge`: request quota from response headers
//! - `decode_page_cursor`: `Link` header + request URL → `PageCursor`
//! - `EntryStore`: per-run ordered buffer with last-page tracking
//! - `reconcile`: last-page vs checkpoint duplicate handling
//! - `SyncOrchestrator`: the sequential fetch loop
//! - `SyncRunner`: checkpoint load → run → sink → checkpoint save

pub mod config;
pub mod cursor;
pub mod entry;
pub mod error;
pub mod fakes;
pub mod obs;
pub mod orchestrator;
pub mod rate_limit;
pub mod reconcile;
pub mod runner;
pub mod sink;
pub mod store;
pub mod telemetry;
pub mod transport;

pub use config::{AccountType, EventTypes, SyncConfig};
pub use cursor::{decode_page_cursor, parse_link_header, parse_query, Links, PageCursor, QueryMap};
pub use entry::{Entry, DOCUMENT_ID_FIELD};
pub use error::{Result, SyncError};
pub use orchestrator::{RunCompletion, SyncOrchestrator, SyncOutcome};
pub use rate_limit::{RateLimitGauge, RateLimitStatus};
pub use reconcile::{
    apply_reconciliation, decide_reconciliation, reconcile, KeepReason, ReconcileAction,
};
pub use runner::{RunReport, SyncRunner};
pub use sink::{EventSink, WriterSink};
pub use store::{EntryStore, LastPage};
pub use telemetry::init_tracing;
pub use transport::{HttpTransport, PageRequest, PageResponse, PageTransport};

pub use auditsync_state::{CheckpointStore, FileCheckpointStore, RunCheckpoint};
