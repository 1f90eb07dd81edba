//! Duplicate-page reconciliation.
//!
//! The upstream feed has no stable page boundary between polling runs, so
//! the only anchor is the previous run's final page: how many entries it
//! held and the identity of the last one. When the current run reaches the
//! feed's last page, that anchor is compared with the page just fetched:
//!
//! | count vs checkpoint | identity | action |
//! |---|---|---|
//! | equal | match | discard every entry |
//! | equal | differs | keep all |
//! | greater | differs | drop `last_count` entries from the start, keeping the final `total - last_count` |
//! | less | any | keep all |
//!
//! A run resumes from the cursor that fetched the previous final page, so
//! its first `last_count` entries are that page again.
//!
//! Equal counts with a different identity are not inspected for partial
//! overlap.

use std::fmt;

use auditsync_state::RunCheckpoint;
use serde::Serialize;

use crate::error::Result;
use crate::store::{EntryStore, LastPage};

/// Why a run's entries were left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepReason {
    /// No previous checkpoint with a last-page anchor.
    NoAnchor,
    /// Same size as the previous last page but a different final entry.
    NewTerminalPage,
    /// Fewer entries than the previous last page.
    ShorterPage,
    /// More entries than before, ending on the same entry.
    GrownSameEnding,
}

/// Outcome of comparing the current last page with the checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    DiscardAll,
    TruncatePrefix(usize),
    Keep(KeepReason),
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileAction::DiscardAll => f.write_str("discard_all"),
            ReconcileAction::TruncatePrefix(n) => write!(f, "truncate_prefix({n})"),
            ReconcileAction::Keep(reason) => write!(f, "keep({reason:?})"),
        }
    }
}

/// Pure decision over the checkpoint and the current run's last page.
pub fn decide_reconciliation(
    checkpoint: Option<&RunCheckpoint>,
    last_page: &LastPage,
    total: usize,
) -> ReconcileAction {
    let Some(checkpoint) = checkpoint.filter(|c| c.has_anchor()) else {
        return ReconcileAction::Keep(KeepReason::NoAnchor);
    };
    let same_identity = last_page.identity == checkpoint.last_document_id;

    match last_page.count.cmp(&checkpoint.last_count) {
        std::cmp::Ordering::Equal if same_identity => ReconcileAction::DiscardAll,
        std::cmp::Ordering::Equal => ReconcileAction::Keep(KeepReason::NewTerminalPage),
        std::cmp::Ordering::Greater if !same_identity => {
            ReconcileAction::TruncatePrefix(checkpoint.last_count.min(total))
        }
        std::cmp::Ordering::Greater => ReconcileAction::Keep(KeepReason::GrownSameEnding),
        std::cmp::Ordering::Less => ReconcileAction::Keep(KeepReason::ShorterPage),
    }
}

/// Apply a decided action to the run's entries.
pub fn apply_reconciliation(action: ReconcileAction, store: &mut EntryStore) -> Result<()> {
    match action {
        ReconcileAction::DiscardAll => store.empty(),
        ReconcileAction::TruncatePrefix(n) => store.truncate_from_start(n)?,
        ReconcileAction::Keep(_) => {}
    }
    Ok(())
}

/// Decide and apply in one step.
pub fn reconcile(
    checkpoint: Option<&RunCheckpoint>,
    store: &mut EntryStore,
) -> Result<ReconcileAction> {
    let action = decide_reconciliation(checkpoint, store.last_page(), store.total());
    apply_reconciliation(action, store)?;
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;
    use serde_json::json;

    fn checkpoint(count: usize, id: &str) -> RunCheckpoint {
        RunCheckpoint {
            last_document_id: id.to_string(),
            last_count: count,
            ..Default::default()
        }
    }

    /// A single-page run whose page holds `count` entries ending on `last_id`.
    fn run_with_page(count: usize, last_id: &str) -> EntryStore {
        let batch = (1..=count)
            .map(|i| {
                let id = if i == count {
                    last_id.to_string()
                } else {
                    format!("P{i}")
                };
                Entry::from_value(json!({"action": "repo.create", "_document_id": id})).unwrap()
            })
            .collect();
        let mut store = EntryStore::new();
        store.merge(batch);
        store.set_has_next_page(false);
        store
    }

    #[test]
    fn same_page_as_last_run_is_discarded() {
        let mut store = run_with_page(10, "X");
        let action = reconcile(Some(&checkpoint(10, "X")), &mut store).unwrap();
        assert_eq!(action, ReconcileAction::DiscardAll);
        assert_eq!(store.total(), 0);
    }

    #[test]
    fn grown_page_drops_overlap_from_start() {
        let mut store = run_with_page(15, "Y");
        let action = reconcile(Some(&checkpoint(10, "X")), &mut store).unwrap();
        assert_eq!(action, ReconcileAction::TruncatePrefix(10));
        assert_eq!(store.total(), 5);
        assert_eq!(store.iter().next().unwrap().identity(), "P11");
        assert_eq!(store.iter().last().unwrap().identity(), "Y");
    }

    #[test]
    fn same_size_different_page_is_untouched() {
        let mut store = run_with_page(10, "Y");
        let action = reconcile(Some(&checkpoint(10, "X")), &mut store).unwrap();
        assert_eq!(action, ReconcileAction::Keep(KeepReason::NewTerminalPage));
        assert_eq!(store.total(), 10);
    }

    #[test]
    fn shorter_page_is_untouched() {
        for last in ["X", "anything"] {
            let mut store = run_with_page(5, last);
            let action = reconcile(Some(&checkpoint(10, "X")), &mut store).unwrap();
            assert_eq!(action, ReconcileAction::Keep(KeepReason::ShorterPage));
            assert_eq!(store.total(), 5);
        }
    }

    #[test]
    fn grown_page_with_same_ending_is_untouched() {
        let mut store = run_with_page(12, "X");
        let action = reconcile(Some(&checkpoint(10, "X")), &mut store).unwrap();
        assert_eq!(action, ReconcileAction::Keep(KeepReason::GrownSameEnding));
        assert_eq!(store.total(), 12);
    }

    #[test]
    fn missing_or_blank_checkpoint_keeps_everything() {
        let store = run_with_page(10, "X");
        assert_eq!(
            decide_reconciliation(None, store.last_page(), store.total()),
            ReconcileAction::Keep(KeepReason::NoAnchor)
        );
        assert_eq!(
            decide_reconciliation(
                Some(&RunCheckpoint::default()),
                store.last_page(),
                store.total()
            ),
            ReconcileAction::Keep(KeepReason::NoAnchor)
        );
    }

    #[test]
    fn truncation_keeps_every_entry_after_the_replayed_page() {
        // Two pages: 100 + 15 entries, checkpoint page held 10.
        let mut store = EntryStore::new();
        let first: Vec<Entry> = (0..100)
            .map(|i| Entry::from_value(json!({"_document_id": format!("A{i}")})).unwrap())
            .collect();
        store.merge(first);
        let last = run_with_page(15, "Y").into_entries();
        store.merge(last);

        let action = reconcile(Some(&checkpoint(10, "X")), &mut store).unwrap();
        assert_eq!(action, ReconcileAction::TruncatePrefix(10));
        assert_eq!(store.total(), 105);
        assert_eq!(store.iter().next().unwrap().identity(), "A10");
        assert_eq!(store.iter().last().unwrap().identity(), "Y");
    }

    #[test]
    fn display_is_log_friendly() {
        assert_eq!(ReconcileAction::DiscardAll.to_string(), "discard_all");
        assert_eq!(ReconcileAction::TruncatePrefix(5).to_string(), "truncate_prefix(5)");
        assert_eq!(
            ReconcileAction::Keep(KeepReason::ShorterPage).to_string(),
            "keep(ShorterPage)"
        );
    }
}
