//! Remote object-store access
//!
//! The sync layer talks to the remote through the small `RemoteFiles`
//! seam: five file primitives, implemented for Dropbox in production and
//! by an in-memory fake in tests.

mod dropbox;
mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use dropbox::DropboxFiles;
pub use store::{CardStore, DOWNLOAD_BATCH};

use crate::error::Result;

/// A file entry from a remote folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Bare file name including extension
    pub name: String,
    /// Full remote path
    pub path: String,
    /// Store-side last-modified timestamp (Unix ms), when reported
    pub modified_at: Option<i64>,
}

/// File primitives against the remote object store.
#[allow(async_fn_in_trait)]
pub trait RemoteFiles {
    /// List a folder non-recursively; an absent folder lists as empty
    async fn list_folder(&self, folder: &str) -> Result<Vec<RemoteEntry>>;

    /// Read a file's text content
    async fn read_text(&self, path: &str) -> Result<String>;

    /// Write text, overwriting any existing file
    async fn write_text(&self, path: &str, text: &str) -> Result<()>;

    /// Delete a file; an absent file is success
    async fn delete_entry(&self, path: &str) -> Result<()>;

    /// Atomically move a file
    async fn move_entry(&self, from: &str, to: &str) -> Result<()>;

    /// Create a folder; an existing folder is success
    async fn create_folder(&self, folder: &str) -> Result<()>;
}
