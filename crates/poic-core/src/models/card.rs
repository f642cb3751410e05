//! Card model

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::now_ms;

/// A unique identifier for a card.
///
/// Fresh identifiers are UUID v7 strings (time-sortable). Cards decoded
/// from remote files may carry arbitrary opaque ids from older clients,
/// so the type is a string newtype rather than a `Uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    /// Create a new unique card ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Derive a deterministic ID from a seed (e.g. a remote file name).
    ///
    /// Falls back to a fresh random ID when the seed is blank.
    #[must_use]
    pub fn from_seed(seed: &str) -> Self {
        let seed = seed.trim();
        if seed.is_empty() {
            Self::new()
        } else {
            Self(seed.to_string())
        }
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CardId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CardId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The closed set of card kinds.
///
/// Purely descriptive except that `due_date`/`completed` only make sense
/// on `Task` cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CardKind {
    /// Daily logs, facts (the baseline kind)
    #[default]
    Record,
    /// Ideas, insights
    Discovery,
    /// Tasks, todos
    Task,
    /// Quotes, books, links
    Reference,
}

impl CardKind {
    /// Stable textual name used by the codec and the CLI.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Record => "Record",
            Self::Discovery => "Discovery",
            Self::Task => "Task",
            Self::Reference => "Reference",
        }
    }

    /// Parse a kind name, defaulting to `Record` for anything unknown.
    #[must_use]
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim() {
            "Discovery" => Self::Discovery,
            "Task" => Self::Task,
            "Reference" => Self::Reference,
            _ => Self::Record,
        }
    }
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A card in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Unique identifier
    pub id: CardId,
    /// Card kind
    #[serde(default)]
    pub kind: CardKind,
    /// Human-readable title; unique among live cards and the remote
    /// filename stem
    pub title: String,
    /// Free text, may embed `[[Title]]` wiki-references and `#tag`s
    #[serde(default)]
    pub body: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last content mutation timestamp (Unix ms); the conflict-resolution
    /// authority
    pub updated_at: i64,
    /// Due date (Unix ms), Task cards only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    /// Completion flag, Task cards only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// Normalized tag set (sorted, deduplicated)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Pin timestamp (Unix ms); `Some` means pinned, and the value is the
    /// pin-order sort key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_at: Option<i64>,
    /// Soft delete flag for sync
    #[serde(default)]
    pub deleted: bool,
    /// Tombstone timestamp (Unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl Card {
    /// Create a new live card with the given title and kind.
    #[must_use]
    pub fn new(title: impl Into<String>, kind: CardKind) -> Self {
        let now = now_ms();
        Self {
            id: CardId::new(),
            kind,
            title: title.into(),
            body: String::new(),
            created_at: now,
            updated_at: now,
            due_date: None,
            completed: None,
            tags: Vec::new(),
            pinned_at: None,
            deleted: false,
            deleted_at: None,
        }
    }

    /// Whether this card is pinned.
    #[must_use]
    pub const fn is_pinned(&self) -> bool {
        self.pinned_at.is_some()
    }

    /// Mark this card as deleted.
    ///
    /// Tombstoning is a content mutation: it stamps `updated_at` so the
    /// deletion wins over older live copies during merge.
    pub fn tombstone(&mut self, now: i64) {
        self.deleted = true;
        self.deleted_at = Some(now);
        self.updated_at = now;
    }

    /// The timestamp retention math runs against.
    ///
    /// Old peers wrote tombstones without `deleted_at`.
    #[must_use]
    pub fn tombstoned_at(&self) -> i64 {
        self.deleted_at.unwrap_or(self.updated_at)
    }
}

/// Normalize a tag list: trim entries, drop empties, sort, deduplicate.
#[must_use]
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut tags: Vec<String> = tags
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Normalize a title: trim and flatten line breaks; reject empty titles.
pub fn normalize_title(title: &str) -> Result<String> {
    let flattened = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.is_empty() {
        return Err(Error::InvalidInput("Card title cannot be empty".into()));
    }
    Ok(flattened)
}

/// Case-insensitive comparison key for titles.
///
/// Wiki-links resolve titles case-insensitively, so uniqueness and lookup
/// use the same folding.
#[must_use]
pub fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}
