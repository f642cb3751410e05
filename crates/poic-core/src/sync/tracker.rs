//! Local change tracking
//!
//! Records which card ids mutated since the last successful upload, plus
//! the previous remote title of any card renamed in between. The drain
//! is an atomic take: a mutation landing while a sync cycle consumes the
//! drained snapshot goes into the fresh set and survives to the next
//! cycle.

use std::collections::{BTreeMap, BTreeSet};
use std::mem;

use serde::{Deserialize, Serialize};

use crate::db::KeyValueStore;
use crate::error::Result;
use crate::models::CardId;

/// KV key holding the pending dirty set between short-lived processes.
const DIRTY_KEY: &str = "dirty";

/// Snapshot taken by a sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainedChanges {
    /// Ids mutated since the last drain
    pub ids: BTreeSet<CardId>,
    /// Previous remote title per renamed id
    pub renames: BTreeMap<CardId, String>,
}

impl DrainedChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// The dirty-id set.
///
/// Process-scoped by default; short-lived frontends (the CLI) save and
/// reload it explicitly so edits made in one invocation reach the sync
/// run in the next.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ChangeTracker {
    dirty: BTreeSet<CardId>,
    renames: BTreeMap<CardId, String>,
}

impl ChangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mutation. Idempotent.
    pub fn mark_dirty(&mut self, id: CardId) {
        self.dirty.insert(id);
    }

    /// Record a rename. Keeps the FIRST old title per id between drains:
    /// the remote file sits at the oldest name, and intermediate renames
    /// never existed remotely.
    pub fn mark_renamed(&mut self, id: CardId, old_title: String) {
        self.renames.entry(id.clone()).or_insert(old_title);
        self.dirty.insert(id);
    }

    /// Whether any changes are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    /// Number of pending dirty ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dirty.len()
    }

    /// Atomically take and clear the pending changes.
    pub fn drain(&mut self) -> DrainedChanges {
        DrainedChanges {
            ids: mem::take(&mut self.dirty),
            renames: mem::take(&mut self.renames),
        }
    }

    /// Load the saved dirty set; an absent key is an empty tracker.
    pub async fn load(kv: &impl KeyValueStore) -> Result<Self> {
        let Some(raw) = kv.get(DIRTY_KEY).await? else {
            return Ok(Self::default());
        };
        Ok(serde_json::from_str(&raw)?)
    }

    /// Save the pending changes for the next process.
    pub async fn persist(&self, kv: &impl KeyValueStore) -> Result<()> {
        let raw = serde_json::to_string(self)?;
        kv.set(DIRTY_KEY, &raw).await
    }

    /// Put failed changes back for the next cycle.
    ///
    /// Restored rename records win over ones marked mid-cycle: the
    /// restored title is the older one, and the remote file is still
    /// there.
    pub fn restore(&mut self, failed: DrainedChanges) {
        self.dirty.extend(failed.ids);
        for (id, old_title) in failed.renames {
            self.renames.insert(id, old_title);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, LibSqlKvStore};

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn tracker_survives_save_and_reload() {
        let db = Database::open_in_memory().await.unwrap();
        let kv = LibSqlKvStore::new(db.connection());

        let mut tracker = ChangeTracker::load(&kv).await.unwrap();
        assert!(tracker.is_empty());

        tracker.mark_dirty(CardId::from("a"));
        tracker.mark_renamed(CardId::from("b"), "Old".to_string());
        tracker.persist(&kv).await.unwrap();

        let mut reloaded = ChangeTracker::load(&kv).await.unwrap();
        assert_eq!(reloaded.len(), 2);
        let drained = reloaded.drain();
        assert_eq!(
            drained.renames.get(&CardId::from("b")).map(String::as_str),
            Some("Old")
        );
    }

    #[test]
    fn mark_dirty_is_idempotent() {
        let mut tracker = ChangeTracker::new();
        tracker.mark_dirty(CardId::from("a"));
        tracker.mark_dirty(CardId::from("a"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn drain_is_lossless_under_concurrent_marks() {
        let mut tracker = ChangeTracker::new();
        tracker.mark_dirty(CardId::from("x"));

        let drained = tracker.drain();
        assert!(drained.ids.contains(&CardId::from("x")));
        assert!(tracker.is_empty());

        // A mutation arriving while the consumer is still working on the
        // drained snapshot must show up in the next drain.
        tracker.mark_dirty(CardId::from("x"));
        let next = tracker.drain();
        assert!(next.ids.contains(&CardId::from("x")));
    }

    #[test]
    fn first_rename_record_wins() {
        let mut tracker = ChangeTracker::new();
        tracker.mark_renamed(CardId::from("a"), "Original".to_string());
        tracker.mark_renamed(CardId::from("a"), "Intermediate".to_string());

        let drained = tracker.drain();
        assert_eq!(
            drained.renames.get(&CardId::from("a")).map(String::as_str),
            Some("Original")
        );
    }

    #[test]
    fn restore_preserves_older_rename() {
        let mut tracker = ChangeTracker::new();
        tracker.mark_renamed(CardId::from("a"), "Original".to_string());
        let drained = tracker.drain();

        // While the cycle was failing, the user renamed again.
        tracker.mark_renamed(CardId::from("a"), "Second".to_string());
        tracker.restore(drained);

        let next = tracker.drain();
        assert_eq!(
            next.renames.get(&CardId::from("a")).map(String::as_str),
            Some("Original")
        );
        assert!(next.ids.contains(&CardId::from("a")));
    }
}
