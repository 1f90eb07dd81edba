//! Per-run entry buffer.
//!
//! An [`EntryStore`] is created empty at the start of a run, grows with every
//! merged page, and is consumed once when the run ends. It is never shared
//! between runs.

use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::error::{Result, SyncError};

/// Descriptor of the most recently merged non-empty page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPage {
    /// Identity of the final entry on the page.
    pub identity: String,
    /// Number of entries on the page.
    pub count: usize,
}

/// Ordered, append-only buffer of the current run's entries.
#[derive(Debug, Clone)]
pub struct EntryStore {
    entries: Vec<Entry>,
    total: usize,
    has_next_page: bool,
    last_page: LastPage,
}

impl Default for EntryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryStore {
    pub fn new() -> Self {
        EntryStore {
            entries: Vec::new(),
            total: 0,
            has_next_page: true,
            last_page: LastPage::default(),
        }
    }

    /// Append one page of entries in response order.
    ///
    /// `last_page` only moves when the batch is non-empty.
    pub fn merge(&mut self, batch: Vec<Entry>) {
        if let Some(last) = batch.last() {
            self.last_page = LastPage {
                identity: last.identity(),
                count: batch.len(),
            };
        }
        self.entries.extend(batch);
        self.total = self.entries.len();
    }

    /// Drop every entry. `last_page` is kept so the run still yields a
    /// checkpoint anchor.
    pub fn empty(&mut self) {
        self.entries.clear();
        self.total = 0;
    }

    /// Remove the first `n` entries, keeping the final `len - n`.
    ///
    /// Rejects `n` larger than the current length rather than clamping.
    pub fn truncate_from_start(&mut self, n: usize) -> Result<()> {
        if n > self.entries.len() {
            return Err(SyncError::InvalidArgument(format!(
                "cannot truncate {n} entries from a run holding {}",
                self.entries.len()
            )));
        }
        self.entries.drain(..n);
        self.total = self.entries.len();
        Ok(())
    }

    pub fn set_has_next_page(&mut self, has_next_page: bool) {
        self.has_next_page = has_next_page;
    }

    pub fn has_next_page(&self) -> bool {
        self.has_next_page
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_page(&self) -> &LastPage {
        &self.last_page
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Forward iterator from the first entry. Each call starts over.
    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a EntryStore {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(ids: std::ops::RangeInclusive<u32>) -> Vec<Entry> {
        ids.map(|i| {
            Entry::from_value(json!({
                "@timestamp": 1614692646000u64 + i as u64,
                "action": "git.fetch",
                "_document_id": format!("E{i}"),
            }))
            .unwrap()
        })
        .collect()
    }

    fn ids(store: &EntryStore) -> Vec<String> {
        store.iter().map(Entry::identity).collect()
    }

    #[test]
    fn new_store_expects_more_pages() {
        let store = EntryStore::new();
        assert!(store.has_next_page());
        assert_eq!(store.total(), 0);
        assert_eq!(store.last_page(), &LastPage::default());
    }

    #[test]
    fn merge_tracks_last_page_per_batch() {
        let mut store = EntryStore::new();
        store.merge(page(1..=10));
        assert_eq!(store.total(), 10);
        assert_eq!(
            store.last_page(),
            &LastPage {
                identity: "E10".into(),
                count: 10
            }
        );

        store.merge(page(11..=13));
        assert_eq!(store.total(), 13);
        assert_eq!(
            store.last_page(),
            &LastPage {
                identity: "E13".into(),
                count: 3
            }
        );
    }

    #[test]
    fn empty_batch_keeps_last_page() {
        let mut store = EntryStore::new();
        store.merge(page(1..=4));
        store.merge(Vec::new());
        assert_eq!(store.last_page().identity, "E4");
        assert_eq!(store.last_page().count, 4);
        assert_eq!(store.total(), 4);
    }

    #[test]
    fn empty_clears_entries_but_not_anchor() {
        let mut store = EntryStore::new();
        store.merge(page(1..=10));
        store.empty();
        assert_eq!(store.total(), 0);
        assert!(store.is_empty());
        assert_eq!(store.last_page().identity, "E10");
    }

    #[test]
    fn truncate_from_start_removes_prefix() {
        let mut store = EntryStore::new();
        store.merge(page(1..=10));
        store.truncate_from_start(5).unwrap();
        assert_eq!(ids(&store), vec!["E6", "E7", "E8", "E9", "E10"]);
        assert_eq!(store.total(), 5);
    }

    #[test]
    fn truncate_edges() {
        let mut store = EntryStore::new();
        store.merge(page(1..=3));
        store.truncate_from_start(0).unwrap();
        assert_eq!(store.total(), 3);
        store.truncate_from_start(3).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn truncate_past_end_is_rejected() {
        let mut store = EntryStore::new();
        store.merge(page(1..=3));
        let err = store.truncate_from_start(4).unwrap_err();
        assert!(matches!(err, SyncError::InvalidArgument(_)));
        assert_eq!(store.total(), 3);
    }

    #[test]
    fn iteration_restarts_from_first_entry() {
        let mut store = EntryStore::new();
        store.merge(page(1..=3));
        let first_pass: Vec<_> = store.iter().take(2).collect();
        assert_eq!(first_pass.len(), 2);
        let second_pass: Vec<String> = (&store).into_iter().map(Entry::identity).collect();
        assert_eq!(second_pass, vec!["E1", "E2", "E3"]);
    }
}
