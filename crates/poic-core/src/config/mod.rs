//! User-tunable settings
//!
//! Persisted as JSON under a single key in the local store and injected
//! into the sync engine at construction time; nothing here is global
//! state.

use serde::{Deserialize, Serialize};

use crate::db::KeyValueStore;
use crate::error::{Error, Result};

/// KV key holding the serialized settings.
const SETTINGS_KEY: &str = "settings";

/// Default remote folder for encoded cards.
pub const DEFAULT_REMOTE_FOLDER: &str = "/cards";
/// Days a tombstone is kept before permanent purge.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
/// Debounce window absorbing edit bursts into one sync cycle.
pub const DEFAULT_DEBOUNCE_MS: u64 = 3_000;
/// Display pattern for timestamps, carried over from the web client.
pub const DEFAULT_DATE_FORMAT: &str = "YYYY/MM/DD ddd HH:mm";

/// Settings for sync behavior and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Dropbox folder holding one file per card
    pub remote_folder: String,
    /// Tombstone retention window in days
    pub retention_days: u32,
    /// Sync debounce window in milliseconds
    pub debounce_ms: u64,
    /// Timestamp display pattern
    pub date_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote_folder: DEFAULT_REMOTE_FOLDER.to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl Settings {
    /// Validate and canonicalize field values.
    pub fn normalized(mut self) -> Result<Self> {
        let folder = self.remote_folder.trim();
        if !folder.starts_with('/') {
            return Err(Error::InvalidInput(
                "Remote folder must be an absolute path like /cards".to_string(),
            ));
        }
        let folder = folder.trim_end_matches('/');
        self.remote_folder = if folder.is_empty() {
            DEFAULT_REMOTE_FOLDER.to_string()
        } else {
            folder.to_string()
        };

        if self.retention_days == 0 {
            return Err(Error::InvalidInput(
                "Retention window must be at least one day".to_string(),
            ));
        }

        if self.date_format.trim().is_empty() {
            self.date_format = DEFAULT_DATE_FORMAT.to_string();
        }

        Ok(self)
    }

    /// Load settings, falling back to defaults when absent.
    pub async fn load(kv: &impl KeyValueStore) -> Result<Self> {
        let Some(raw) = kv.get(SETTINGS_KEY).await? else {
            return Ok(Self::default());
        };
        let settings: Self = serde_json::from_str(&raw)?;
        settings.normalized()
    }

    /// Persist settings.
    pub async fn save(&self, kv: &impl KeyValueStore) -> Result<()> {
        let raw = serde_json::to_string(self)?;
        kv.set(SETTINGS_KEY, &raw).await
    }
}
