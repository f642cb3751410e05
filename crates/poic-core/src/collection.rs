//! The local card collection
//!
//! An in-memory card set with the write-time invariants (title
//! uniqueness among live cards, patch application, tombstoning) plus
//! persistence as a single JSON document in the key/value store.
//! Persistence failures propagate to the caller: silently losing a
//! mutation is worse than a visible error.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;

use crate::db::KeyValueStore;
use crate::error::{Error, Result};
use crate::models::{
    normalize_tags, normalize_title, title_key, Card, CardId, CardKind, CardPatch,
};
use crate::util::now_ms;

/// KV key holding the full card collection as a JSON array.
pub const CARDS_KEY: &str = "cards";

/// KV marker set once the legacy single-file export has been imported.
const LEGACY_IMPORT_MARKER: &str = "migration:v1";

/// Fields for a card being created.
#[derive(Debug, Clone, Default)]
pub struct NewCard {
    pub title: String,
    pub kind: CardKind,
    pub body: String,
    pub tags: Vec<String>,
    pub due_date: Option<i64>,
}

/// Result of applying a patch through the collection.
#[derive(Debug, Clone, Default)]
pub struct PatchOutcome {
    /// Whether the card itself changed (and was stamped)
    pub changed: bool,
    /// The previous title when the patch renamed the card; the remote
    /// file still sits under this name until the next sync
    pub renamed_from: Option<String>,
    /// Other cards whose bodies were rewritten to follow the rename
    pub relinked: Vec<CardId>,
}

/// The in-memory card set.
#[derive(Debug, Clone, Default)]
pub struct CardCollection {
    cards: Vec<Card>,
}

impl CardCollection {
    /// Create an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { cards: Vec::new() }
    }

    /// Wrap an existing card list.
    #[must_use]
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// Load the collection from the key/value store; an absent key is an
    /// empty collection.
    pub async fn load(kv: &impl KeyValueStore) -> Result<Self> {
        let Some(raw) = kv.get(CARDS_KEY).await? else {
            return Ok(Self::new());
        };
        let cards: Vec<Card> = serde_json::from_str(&raw)?;
        Ok(Self { cards })
    }

    /// Persist the collection as one JSON document.
    pub async fn persist(&self, kv: &impl KeyValueStore) -> Result<()> {
        let raw = serde_json::to_string(&self.cards)?;
        kv.set(CARDS_KEY, &raw).await
    }

    /// All cards, tombstones included.
    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Non-deleted cards.
    pub fn live(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|card| !card.deleted)
    }

    /// Look up a card by id, tombstones included.
    #[must_use]
    pub fn get(&self, id: &CardId) -> Option<&Card> {
        self.cards.iter().find(|card| &card.id == id)
    }

    /// Look up a live card by title (case-insensitive, matching
    /// wiki-link resolution).
    #[must_use]
    pub fn find_live_by_title(&self, title: &str) -> Option<&Card> {
        let key = title_key(title);
        self.live().find(|card| title_key(&card.title) == key)
    }

    /// Create a new card. Rejects duplicate live titles before any state
    /// changes.
    pub fn create(&mut self, new: NewCard) -> Result<CardId> {
        let title = normalize_title(&new.title)?;
        self.ensure_title_free(&title, None)?;

        let mut card = Card::new(title, new.kind);
        card.body = new.body;
        card.tags = normalize_tags(new.tags);
        card.due_date = new.due_date;
        if new.kind == CardKind::Task {
            card.completed = Some(false);
        }

        let id = card.id.clone();
        self.cards.push(card);
        Ok(id)
    }

    /// Apply a patch to a live card.
    ///
    /// A title change is collision-checked first and rewrites inbound
    /// `[[Old Title]]` wiki-links in every other live card, bumping those
    /// cards too (they changed observably).
    pub fn apply_patch(&mut self, id: &CardId, patch: CardPatch, now: i64) -> Result<PatchOutcome> {
        let mut patch = patch;
        if let Some(title) = patch.title.take() {
            patch.title = Some(normalize_title(&title)?);
        }
        if let Some(title) = &patch.title {
            self.ensure_title_free(title, Some(id))?;
        }

        let card = self.live_card_mut(id)?;
        let old_title = card.title.clone();
        let changed = card.apply(&patch, now);

        let mut outcome = PatchOutcome {
            changed,
            ..PatchOutcome::default()
        };

        let new_title = patch.title.as_deref().unwrap_or(&old_title);
        if changed && title_key(new_title) != title_key(&old_title) {
            outcome.renamed_from = Some(old_title.clone());
            outcome.relinked = self.rewrite_links(id, &old_title, new_title, now);
        }
        Ok(outcome)
    }

    /// Soft-delete a card.
    pub fn tombstone(&mut self, id: &CardId, now: i64) -> Result<()> {
        let card = self.live_card_mut(id)?;
        card.tombstone(now);
        Ok(())
    }

    /// Toggle the pin state, returning whether the card is now pinned.
    pub fn toggle_pin(&mut self, id: &CardId, now: i64) -> Result<bool> {
        let card = self.live_card_mut(id)?;
        card.pinned_at = if card.is_pinned() { None } else { Some(now) };
        card.updated_at = now;
        Ok(card.is_pinned())
    }

    /// Toggle Task completion, returning the new state.
    pub fn toggle_completed(&mut self, id: &CardId, now: i64) -> Result<bool> {
        let card = self.live_card_mut(id)?;
        if card.kind != CardKind::Task {
            return Err(Error::InvalidInput(format!(
                "Card '{}' is not a Task",
                card.title
            )));
        }
        let completed = !card.completed.unwrap_or(false);
        card.completed = Some(completed);
        card.updated_at = now;
        Ok(completed)
    }

    /// Replace the whole set (sync commit).
    pub fn replace_all(&mut self, cards: Vec<Card>) {
        self.cards = cards;
    }

    /// Drop the given ids from the set (retention purge).
    pub fn remove_ids(&mut self, ids: &HashSet<CardId>) {
        self.cards.retain(|card| !ids.contains(&card.id));
    }

    fn live_card_mut(&mut self, id: &CardId) -> Result<&mut Card> {
        self.cards
            .iter_mut()
            .find(|card| &card.id == id && !card.deleted)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn ensure_title_free(&self, title: &str, except: Option<&CardId>) -> Result<()> {
        let key = title_key(title);
        let taken = self
            .live()
            .any(|card| Some(&card.id) != except && title_key(&card.title) == key);
        if taken {
            Err(Error::TitleConflict(title.to_string()))
        } else {
            Ok(())
        }
    }

    fn rewrite_links(
        &mut self,
        renamed: &CardId,
        old_title: &str,
        new_title: &str,
        now: i64,
    ) -> Vec<CardId> {
        let Ok(pattern) = Regex::new(&format!(r"(?i)\[\[{}\]\]", regex::escape(old_title))) else {
            return Vec::new();
        };
        let replacement = format!("[[{new_title}]]");

        let mut relinked = Vec::new();
        for card in &mut self.cards {
            if &card.id == renamed || card.deleted || !pattern.is_match(&card.body) {
                continue;
            }
            card.body = pattern.replace_all(&card.body, replacement.as_str()).into_owned();
            card.updated_at = now;
            relinked.push(card.id.clone());
        }
        relinked
    }
}

/// One-shot import of a legacy single-file JSON export into the store.
///
/// The original web client kept the whole collection in one JSON array;
/// this folds such a file into the current collection by last-write-wins
/// on id, guarded by a marker key so it runs at most once.
pub async fn import_legacy_export(kv: &impl KeyValueStore, path: &Path) -> Result<usize> {
    if kv.get(LEGACY_IMPORT_MARKER).await?.is_some() {
        return Ok(0);
    }

    let adopted = if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let legacy: Vec<Card> = serde_json::from_str(&raw)?;

        let mut collection = CardCollection::load(kv).await?;
        let mut count = 0usize;
        for card in legacy {
            match collection.get(&card.id) {
                Some(existing) if existing.updated_at >= card.updated_at => {}
                _ => {
                    collection.cards.retain(|c| c.id != card.id);
                    collection.cards.push(card);
                    count += 1;
                }
            }
        }
        collection.persist(kv).await?;
        count
    } else {
        0
    };

    kv.set(LEGACY_IMPORT_MARKER, &now_ms().to_string()).await?;
    if adopted > 0 {
        tracing::info!("Imported {adopted} cards from legacy export");
    }
    Ok(adopted)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::db::{Database, LibSqlKvStore};

    use super::*;

    fn collection_with(titles: &[&str]) -> CardCollection {
        let mut collection = CardCollection::new();
        for title in titles {
            collection
                .create(NewCard {
                    title: (*title).to_string(),
                    ..NewCard::default()
                })
                .unwrap();
        }
        collection
    }

    #[test]
    fn create_rejects_duplicate_live_title() {
        let mut collection = collection_with(&["Inbox"]);
        let error = collection
            .create(NewCard {
                title: " inbox ".to_string(),
                ..NewCard::default()
            })
            .unwrap_err();
        assert!(matches!(error, Error::TitleConflict(_)));
    }

    #[test]
    fn tombstoned_title_is_reusable() {
        let mut collection = collection_with(&["Inbox"]);
        let id = collection.live().next().unwrap().id.clone();
        collection.tombstone(&id, now_ms()).unwrap();

        collection
            .create(NewCard {
                title: "Inbox".to_string(),
                ..NewCard::default()
            })
            .unwrap();
        assert_eq!(collection.live().count(), 1);
        assert_eq!(collection.cards().len(), 2);
    }

    #[test]
    fn create_task_starts_incomplete() {
        let mut collection = CardCollection::new();
        let id = collection
            .create(NewCard {
                title: "Ship it".to_string(),
                kind: CardKind::Task,
                ..NewCard::default()
            })
            .unwrap();
        assert_eq!(collection.get(&id).unwrap().completed, Some(false));
    }

    #[test]
    fn rename_rewrites_inbound_links_and_bumps_referrers() {
        let mut collection = CardCollection::new();
        let target = collection
            .create(NewCard {
                title: "Milk".to_string(),
                ..NewCard::default()
            })
            .unwrap();
        let referrer = collection
            .create(NewCard {
                title: "Groceries".to_string(),
                body: "buy [[milk]] today".to_string(),
                ..NewCard::default()
            })
            .unwrap();

        let before = collection.get(&referrer).unwrap().updated_at;
        let patch = CardPatch {
            title: Some("Oat Milk".to_string()),
            ..CardPatch::default()
        };
        let outcome = collection.apply_patch(&target, patch, before + 10).unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.renamed_from.as_deref(), Some("Milk"));
        assert_eq!(outcome.relinked, vec![referrer.clone()]);

        let rewritten = collection.get(&referrer).unwrap();
        assert_eq!(rewritten.body, "buy [[Oat Milk]] today");
        assert_eq!(rewritten.updated_at, before + 10);
    }

    #[test]
    fn rename_into_taken_title_is_rejected_without_changes() {
        let mut collection = collection_with(&["One", "Two"]);
        let id = collection.find_live_by_title("One").unwrap().id.clone();

        let patch = CardPatch {
            title: Some("two".to_string()),
            ..CardPatch::default()
        };
        let error = collection.apply_patch(&id, patch, now_ms()).unwrap_err();
        assert!(matches!(error, Error::TitleConflict(_)));
        assert_eq!(collection.find_live_by_title("One").unwrap().id, id);
    }

    #[test]
    fn noop_patch_reports_unchanged() {
        let mut collection = collection_with(&["Static"]);
        let id = collection.live().next().unwrap().id.clone();
        let body = collection.get(&id).unwrap().body.clone();

        let patch = CardPatch {
            body: Some(body),
            ..CardPatch::default()
        };
        let outcome = collection.apply_patch(&id, patch, now_ms() + 10).unwrap();
        assert!(!outcome.changed);
        assert!(outcome.renamed_from.is_none());
    }

    #[test]
    fn toggle_pin_round_trips() {
        let mut collection = collection_with(&["Pinned"]);
        let id = collection.live().next().unwrap().id.clone();

        assert!(collection.toggle_pin(&id, 5_000).unwrap());
        assert_eq!(collection.get(&id).unwrap().pinned_at, Some(5_000));
        assert!(!collection.toggle_pin(&id, 6_000).unwrap());
        assert_eq!(collection.get(&id).unwrap().pinned_at, None);
    }

    #[test]
    fn toggle_completed_requires_task() {
        let mut collection = collection_with(&["Not a task"]);
        let id = collection.live().next().unwrap().id.clone();
        assert!(matches!(
            collection.toggle_completed(&id, now_ms()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn persist_and_load_round_trip() {
        let db = Database::open_in_memory().await.unwrap();
        let kv = LibSqlKvStore::new(db.connection());

        let mut collection = collection_with(&["A", "B"]);
        let id = collection.find_live_by_title("A").unwrap().id.clone();
        collection.tombstone(&id, now_ms()).unwrap();
        collection.persist(&kv).await.unwrap();

        let loaded = CardCollection::load(&kv).await.unwrap();
        assert_eq!(loaded.cards(), collection.cards());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn load_missing_key_is_empty() {
        let db = Database::open_in_memory().await.unwrap();
        let kv = LibSqlKvStore::new(db.connection());

        let loaded = CardCollection::load(&kv).await.unwrap();
        assert!(loaded.cards().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn legacy_import_runs_once() {
        let db = Database::open_in_memory().await.unwrap();
        let kv = LibSqlKvStore::new(db.connection());

        let tmp = tempfile::tempdir().unwrap();
        let export_path = tmp.path().join("poic_data.json");
        let legacy = vec![Card::new("From the old app", CardKind::Record)];
        std::fs::write(&export_path, serde_json::to_string(&legacy).unwrap()).unwrap();

        assert_eq!(import_legacy_export(&kv, &export_path).await.unwrap(), 1);
        let loaded = CardCollection::load(&kv).await.unwrap();
        assert_eq!(loaded.live().count(), 1);

        // Marker prevents re-import
        assert_eq!(import_legacy_export(&kv, &export_path).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn legacy_import_keeps_newer_local_copy() {
        let db = Database::open_in_memory().await.unwrap();
        let kv = LibSqlKvStore::new(db.connection());

        let mut local = Card::new("Shared", CardKind::Record);
        local.updated_at = 2_000;
        let mut legacy = local.clone();
        legacy.body = "stale".to_string();
        legacy.updated_at = 1_000;

        CardCollection::from_cards(vec![local.clone()])
            .persist(&kv)
            .await
            .unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let export_path = tmp.path().join("poic_data.json");
        std::fs::write(&export_path, serde_json::to_string(&vec![legacy]).unwrap()).unwrap();

        assert_eq!(import_legacy_export(&kv, &export_path).await.unwrap(), 0);
        let loaded = CardCollection::load(&kv).await.unwrap();
        assert_eq!(loaded.get(&local.id).unwrap().updated_at, 2_000);
    }
}
