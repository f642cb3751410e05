//! Card-level operations over the remote file primitives
//!
//! Each non-purged card is one encoded file in a flat folder, named
//! after its sanitized title. The listing itself is the source of truth
//! for what exists remotely; there is no manifest file.

use futures::future;
use tokio::sync::OnceCell;

use crate::codec::{self, FILE_EXTENSION};
use crate::error::Result;
use crate::models::Card;

use super::{RemoteEntry, RemoteFiles};

/// Concurrent fetches/uploads per batch, bounding remote API load.
pub const DOWNLOAD_BATCH: usize = 5;

/// Longest allowed filename stem in characters.
const MAX_STEM_CHARS: usize = 120;

/// Card store over a remote folder.
pub struct CardStore<R: RemoteFiles> {
    remote: R,
    folder: String,
    folder_ready: OnceCell<()>,
}

impl<R: RemoteFiles> CardStore<R> {
    pub fn new(remote: R, folder: impl Into<String>) -> Self {
        Self {
            remote,
            folder: folder.into(),
            folder_ready: OnceCell::new(),
        }
    }

    /// The underlying remote client.
    #[must_use]
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Remote path for a card's title.
    #[must_use]
    pub fn card_path(&self, title: &str) -> String {
        format!("{}/{}", self.folder, card_file_name(title))
    }

    /// Encode and upload one card, overwriting the remote copy.
    ///
    /// The folder is created lazily once per store; an existing folder is
    /// not an error.
    pub async fn upload_card(&self, card: &Card) -> Result<()> {
        self.ensure_folder().await?;
        self.remote
            .write_text(&self.card_path(&card.title), &codec::encode(card))
            .await
    }

    /// Download and decode every card in the folder.
    ///
    /// Fetches run in batches of [`DOWNLOAD_BATCH`], each batch awaited
    /// fully before the next starts. A file that fails to read or decode
    /// is logged and dropped; only an auth failure aborts the whole pass.
    pub async fn download_all(&self) -> Result<Vec<Card>> {
        let entries = self.remote.list_folder(&self.folder).await?;
        let extension = format!(".{FILE_EXTENSION}");
        let files: Vec<RemoteEntry> = entries
            .into_iter()
            .filter(|entry| entry.name.ends_with(&extension))
            .collect();

        let mut cards = Vec::with_capacity(files.len());
        for chunk in files.chunks(DOWNLOAD_BATCH) {
            let fetched = future::join_all(chunk.iter().map(|entry| self.fetch_card(entry))).await;
            for (entry, result) in chunk.iter().zip(fetched) {
                match result {
                    Ok(Some(card)) => cards.push(card),
                    Ok(None) => {}
                    Err(error) if error.is_auth() => return Err(error),
                    Err(error) => {
                        tracing::warn!("Skipping remote card {}: {error}", entry.path);
                    }
                }
            }
        }
        Ok(cards)
    }

    /// Remove a card's remote file outright. Absent files are success.
    pub async fn permanently_delete(&self, card: &Card) -> Result<()> {
        self.remote.delete_entry(&self.card_path(&card.title)).await
    }

    /// Move a card's remote file from its previous title to the current
    /// one, then upload the current content.
    ///
    /// A lost rename race (source already gone, destination taken) falls
    /// back to the plain upload rather than failing the operation.
    pub async fn rename(&self, old_title: &str, card: &Card) -> Result<()> {
        let from = self.card_path(old_title);
        let to = self.card_path(&card.title);
        if from != to {
            match self.remote.move_entry(&from, &to).await {
                Ok(()) => {}
                Err(error) if error.is_auth() => return Err(error),
                Err(error) => {
                    tracing::warn!("Rename {from} -> {to} failed ({error}); uploading fresh copy");
                }
            }
        }
        self.upload_card(card).await
    }

    async fn ensure_folder(&self) -> Result<()> {
        self.folder_ready
            .get_or_try_init(|| self.remote.create_folder(&self.folder))
            .await?;
        Ok(())
    }

    async fn fetch_card(&self, entry: &RemoteEntry) -> Result<Option<Card>> {
        let text = self.remote.read_text(&entry.path).await?;
        let stem = entry
            .name
            .strip_suffix(&format!(".{FILE_EXTENSION}"))
            .unwrap_or(&entry.name);

        let Some(mut card) = codec::decode(&text, stem) else {
            tracing::warn!("Skipping malformed remote card {}", entry.path);
            return Ok(None);
        };

        // Tolerate out-of-band edits that didn't touch the embedded
        // metadata: the store's own mtime can only move a card forward.
        if let Some(modified_at) = entry.modified_at {
            card.updated_at = card.updated_at.max(modified_at);
        }
        Ok(Some(card))
    }
}

/// Derive the remote file name for a title: replace characters illegal on
/// common filesystems with `-`, collapse runs, cap the length, and append
/// the codec extension. Deterministic; collisions between distinct titles
/// are not deduplicated here.
#[must_use]
pub fn card_file_name(title: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    let mut last_dash = false;
    for ch in title.chars() {
        let illegal = matches!(ch, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || ch.is_control();
        if illegal {
            if !last_dash {
                stem.push('-');
                last_dash = true;
            }
        } else {
            stem.push(ch);
            last_dash = false;
        }
    }

    let stem: String = stem
        .trim_matches(|ch: char| ch == '-' || ch.is_whitespace())
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    let stem = stem.trim_end();
    if stem.is_empty() {
        format!("card.{FILE_EXTENSION}")
    } else {
        format!("{stem}.{FILE_EXTENSION}")
    }
}
