//! Key/value repository over the local database

use libsql::Connection;

use crate::error::Result;

/// Trait for durable key/value storage (async).
///
/// The card collection, settings, credential, and migration markers all
/// persist through this interface.
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    /// Read a value, `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, overwriting any existing one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; absent keys are not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// libSQL implementation of `KeyValueStore`
pub struct LibSqlKvStore<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlKvStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl KeyValueStore for LibSqlKvStore<'_> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM kv WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?", [key])
            .await?;
        Ok(())
    }
}
