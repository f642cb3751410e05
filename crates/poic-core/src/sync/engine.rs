//! The sync engine
//!
//! Reconciles the local collection against the remote folder in strictly
//! sequential phases: retention sweep, upload of local changes, full
//! download, timestamp merge, commit. Cycles never overlap; a trigger
//! arriving mid-cycle is coalesced into one trailing re-run. Conflict
//! resolution is last-write-wins on `updated_at` per card id.

use std::collections::{BTreeMap, HashSet};
use std::mem;

use futures::future;

use crate::collection::CardCollection;
use crate::error::Result;
use crate::models::{Card, CardId};
use crate::remote::{CardStore, RemoteFiles, DOWNLOAD_BATCH};
use crate::util::now_ms;

use super::retention::RetentionPolicy;
use super::tracker::{ChangeTracker, DrainedChanges};

/// Engine phase within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Uploading,
    Downloading,
    Merging,
}

/// How thorough a cycle should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Upload dirty cards, then download and merge
    Incremental,
    /// Additionally push cards the dirty tracking never saw (id-set
    /// difference against the remote listing)
    Full,
}

/// What a sync pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Cycles run (retention purges request follow-up cycles)
    pub cycles: usize,
    /// Tombstones promoted to permanent deletion
    pub purged: usize,
    /// Live cards uploaded
    pub uploaded: usize,
    /// Tombstones pushed as logical deletes
    pub tombstones_pushed: usize,
    /// Remote versions adopted locally
    pub adopted: usize,
    /// Stale remote copies overwritten with newer local versions
    pub healed: usize,
    /// Cards whose upload failed and stay dirty for the next cycle
    pub failed: usize,
}

/// Orchestrates sync cycles over a [`CardStore`].
pub struct SyncEngine<R: RemoteFiles> {
    store: CardStore<R>,
    retention: RetentionPolicy,
    batch_size: usize,
    phase: SyncPhase,
    in_flight: bool,
    rerun_requested: bool,
    last_sync_time: Option<i64>,
}

impl<R: RemoteFiles> SyncEngine<R> {
    #[must_use]
    pub fn new(store: CardStore<R>, retention: RetentionPolicy) -> Self {
        Self {
            store,
            retention,
            batch_size: DOWNLOAD_BATCH,
            phase: SyncPhase::Idle,
            in_flight: false,
            rerun_requested: false,
            last_sync_time: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Timestamp of the last successful reconciliation.
    #[must_use]
    pub const fn last_sync_time(&self) -> Option<i64> {
        self.last_sync_time
    }

    /// Run sync cycles until no follow-up is pending.
    ///
    /// An auth failure aborts immediately with the dirty set intact; the
    /// caller surfaces a disconnected state.
    pub async fn sync(
        &mut self,
        collection: &mut CardCollection,
        tracker: &mut ChangeTracker,
        mode: SyncMode,
    ) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        loop {
            let follow_up = self.run_cycle(collection, tracker, mode, &mut report).await?;
            report.cycles += 1;
            if !follow_up && !mem::take(&mut self.rerun_requested) {
                break;
            }
        }
        Ok(report)
    }

    async fn run_cycle(
        &mut self,
        collection: &mut CardCollection,
        tracker: &mut ChangeTracker,
        mode: SyncMode,
        report: &mut SyncReport,
    ) -> Result<bool> {
        // Check-and-set guard: cooperative scheduling means nothing can
        // interleave between the check and the set, so a bool suffices.
        if self.in_flight {
            self.rerun_requested = true;
            return Ok(false);
        }
        self.in_flight = true;
        let outcome = self.cycle_inner(collection, tracker, mode, report).await;
        self.in_flight = false;
        self.phase = SyncPhase::Idle;
        outcome
    }

    async fn cycle_inner(
        &mut self,
        collection: &mut CardCollection,
        tracker: &mut ChangeTracker,
        mode: SyncMode,
        report: &mut SyncReport,
    ) -> Result<bool> {
        let now = now_ms();

        // Retention sweep runs first; a purge changes local state, so the
        // cycle stops here and requests a fresh comparison.
        let purged: Vec<Card> = {
            let (_, purged) = self.retention.partition(collection.cards(), now);
            purged.into_iter().cloned().collect()
        };
        if !purged.is_empty() {
            self.purge_remote(&purged).await?;
            let ids: HashSet<CardId> = purged.iter().map(|card| card.id.clone()).collect();
            collection.remove_ids(&ids);
            report.purged += purged.len();
            return Ok(true);
        }

        let changes = tracker.drain();
        match self.push_and_merge(collection, &changes, mode, report).await {
            Ok(failed) => {
                report.failed += failed.ids.len();
                tracker.restore(failed);
                self.last_sync_time = Some(now_ms());
                Ok(false)
            }
            Err(error) => {
                // The whole drained snapshot stays dirty; uploads are
                // idempotent, so retrying already-pushed cards is safe.
                tracker.restore(changes);
                Err(error)
            }
        }
    }

    async fn purge_remote(&self, purged: &[Card]) -> Result<()> {
        for chunk in purged.chunks(self.batch_size) {
            let results =
                future::join_all(chunk.iter().map(|card| self.store.permanently_delete(card)))
                    .await;
            for (card, result) in chunk.iter().zip(results) {
                match result {
                    Ok(()) => tracing::debug!("Purged '{}' from the remote store", card.title),
                    Err(error) if error.is_auth() => return Err(error),
                    // The tombstone already communicated the deletion to
                    // peers; local removal proceeds regardless.
                    Err(error) => {
                        tracing::warn!("Remote purge of '{}' failed: {error}", card.title);
                    }
                }
            }
        }
        Ok(())
    }

    async fn push_and_merge(
        &mut self,
        collection: &mut CardCollection,
        changes: &DrainedChanges,
        mode: SyncMode,
        report: &mut SyncReport,
    ) -> Result<DrainedChanges> {
        self.phase = SyncPhase::Uploading;
        let mut failed = DrainedChanges::default();

        let dirty_cards: Vec<Card> = changes
            .ids
            .iter()
            .filter_map(|id| {
                let card = collection.get(id);
                if card.is_none() {
                    tracing::debug!("Dropping dirty id {id} with no local card");
                }
                card.cloned()
            })
            .collect();

        for chunk in dirty_cards.chunks(self.batch_size) {
            let results = future::join_all(
                chunk
                    .iter()
                    .map(|card| self.push_card(card, changes.renames.get(&card.id))),
            )
            .await;
            for (card, result) in chunk.iter().zip(results) {
                match result {
                    Ok(()) => {
                        if card.deleted {
                            report.tombstones_pushed += 1;
                        } else {
                            report.uploaded += 1;
                        }
                    }
                    Err(error) if error.is_auth() => return Err(error),
                    Err(error) => {
                        tracing::warn!("Upload of '{}' failed: {error}", card.title);
                        if let Some(old_title) = changes.renames.get(&card.id) {
                            failed.renames.insert(card.id.clone(), old_title.clone());
                        }
                        failed.ids.insert(card.id.clone());
                    }
                }
            }
        }

        self.phase = SyncPhase::Downloading;
        let remote_cards = self.store.download_all().await?;

        if mode == SyncMode::Full {
            // Cover entries the incremental tracking missed, e.g. after a
            // crash between a mutation and the tracker update.
            let remote_ids: HashSet<&CardId> = remote_cards.iter().map(|card| &card.id).collect();
            let local_only: Vec<Card> = collection
                .cards()
                .iter()
                .filter(|card| !remote_ids.contains(&card.id) && !failed.ids.contains(&card.id))
                .cloned()
                .collect();

            for chunk in local_only.chunks(self.batch_size) {
                let results =
                    future::join_all(chunk.iter().map(|card| self.store.upload_card(card))).await;
                for (card, result) in chunk.iter().zip(results) {
                    match result {
                        Ok(()) => report.uploaded += 1,
                        Err(error) if error.is_auth() => return Err(error),
                        Err(error) => {
                            tracing::warn!("Upload of '{}' failed: {error}", card.title);
                            failed.ids.insert(card.id.clone());
                        }
                    }
                }
            }
        }

        self.phase = SyncPhase::Merging;
        let plan = merge_remote(collection.cards().to_vec(), remote_cards);
        report.adopted += plan.adopted;

        for chunk in plan.heal.chunks(self.batch_size) {
            let results =
                future::join_all(chunk.iter().map(|card| self.store.upload_card(card))).await;
            for (card, result) in chunk.iter().zip(results) {
                match result {
                    Ok(()) => report.healed += 1,
                    Err(error) if error.is_auth() => return Err(error),
                    // The next cycle's merge detects the stale copy again.
                    Err(error) => {
                        tracing::warn!("Healing upload of '{}' failed: {error}", card.title);
                    }
                }
            }
        }

        collection.replace_all(plan.merged);
        Ok(failed)
    }

    async fn push_card(&self, card: &Card, renamed_from: Option<&String>) -> Result<()> {
        match renamed_from {
            Some(old_title) => self.store.rename(old_title, card).await,
            None => self.store.upload_card(card).await,
        }
    }
}

#[derive(Debug, Default)]
struct MergePlan {
    merged: Vec<Card>,
    heal: Vec<Card>,
    adopted: usize,
}

/// Last-write-wins merge of the downloaded remote state into the local
/// set.
///
/// The map covers the full local set, tombstones included: a tombstone
/// newer than a stale remote live copy must win (and heal the remote),
/// not get resurrected.
fn merge_remote(local: Vec<Card>, remote: Vec<Card>) -> MergePlan {
    let mut map: BTreeMap<CardId, Card> = local
        .into_iter()
        .map(|card| (card.id.clone(), card))
        .collect();
    let mut heal = Vec::new();
    let mut adopted = 0;

    for remote_card in remote {
        match map.get(&remote_card.id) {
            None => {
                adopted += 1;
                map.insert(remote_card.id.clone(), remote_card);
            }
            Some(local_card) => {
                if remote_card.updated_at > local_card.updated_at {
                    adopted += 1;
                    map.insert(remote_card.id.clone(), remote_card);
                } else if local_card.updated_at > remote_card.updated_at {
                    heal.push(local_card.clone());
                }
                // Equal timestamps keep local with no network call.
            }
        }
    }

    MergePlan {
        merged: map.into_values().collect(),
        heal,
        adopted,
    }
}
