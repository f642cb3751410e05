//! Dropbox credential handling
//!
//! Token acquisition (OAuth/PKCE) happens outside the core; this module
//! only models "a valid access credential, or nothing". The sync layer
//! treats a missing credential and a server-rejected one identically.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::db::KeyValueStore;
use crate::error::Result;
use crate::util::normalize_text_option;

/// KV key holding the stored Dropbox access token.
const TOKEN_KEY: &str = "dropbox_token";

/// A bearer access token. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a non-empty token; blank input yields `None`.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        normalize_text_option(Some(raw.into())).map(Self)
    }

    /// The secret value, for the `Authorization` header.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_tuple("BearerToken").field(&"[REDACTED]").finish()
    }
}

/// Source of a usable access credential.
///
/// `access_token` returns a valid token or `None`; callers map `None`
/// (and any server-side rejection) to a disconnected state.
#[allow(async_fn_in_trait)]
pub trait CredentialSource {
    /// A currently valid access token, or `None` when disconnected.
    async fn access_token(&self) -> Result<Option<BearerToken>>;

    /// Whether any credential is present at all.
    fn has_credential(&self) -> bool;
}

/// Credential held in memory after loading from the key/value store.
#[derive(Debug, Clone, Default)]
pub struct StoredCredential {
    token: Option<BearerToken>,
}

impl StoredCredential {
    /// Wrap an already-known token.
    #[must_use]
    pub const fn with_token(token: BearerToken) -> Self {
        Self { token: Some(token) }
    }

    /// Load the stored token, if any.
    pub async fn load(kv: &impl KeyValueStore) -> Result<Self> {
        let token = kv.get(TOKEN_KEY).await?.and_then(BearerToken::new);
        Ok(Self { token })
    }

    /// Persist a token for future sessions.
    pub async fn store(kv: &impl KeyValueStore, token: &BearerToken) -> Result<()> {
        kv.set(TOKEN_KEY, token.secret()).await
    }

    /// Forget the stored token (disconnect).
    pub async fn clear(kv: &impl KeyValueStore) -> Result<()> {
        kv.remove(TOKEN_KEY).await
    }
}

impl CredentialSource for StoredCredential {
    async fn access_token(&self) -> Result<Option<BearerToken>> {
        Ok(self.token.clone())
    }

    fn has_credential(&self) -> bool {
        self.token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, LibSqlKvStore};

    use super::*;

    #[test]
    fn bearer_token_rejects_blank() {
        assert!(BearerToken::new("   ").is_none());
        assert_eq!(BearerToken::new(" tok ").unwrap().secret(), "tok");
    }

    #[test]
    fn bearer_token_debug_redacts_secret() {
        let token = BearerToken::new("sl.super-secret").unwrap();
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stored_credential_round_trip() {
        let db = Database::open_in_memory().await.unwrap();
        let kv = LibSqlKvStore::new(db.connection());

        let loaded = StoredCredential::load(&kv).await.unwrap();
        assert!(!loaded.has_credential());

        let token = BearerToken::new("sl.abc").unwrap();
        StoredCredential::store(&kv, &token).await.unwrap();

        let loaded = StoredCredential::load(&kv).await.unwrap();
        assert!(loaded.has_credential());
        assert_eq!(loaded.access_token().await.unwrap(), Some(token));

        StoredCredential::clear(&kv).await.unwrap();
        let loaded = StoredCredential::load(&kv).await.unwrap();
        assert!(!loaded.has_credential());
    }
}
