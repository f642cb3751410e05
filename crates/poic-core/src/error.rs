//! Error types for poic-core

use thiserror::Error;

/// Result type alias using poic-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in poic-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// No usable credential, or the remote rejected the one we sent.
    /// Fatal to a sync cycle; the caller must re-authenticate.
    #[error("Dropbox authentication required")]
    AuthRequired,

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote API rejected a single operation
    #[error("Remote API error: {0}")]
    Remote(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Card not found
    #[error("Card not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Another live card already uses this title
    #[error("Title already in use: {0}")]
    TitleConflict(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error must abort a sync cycle and surface a
    /// disconnected state, as opposed to a per-card failure.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::AuthRequired)
    }
}
