use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] poic_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Card not found for id/title: {0}")]
    CardNotFound(String),
    #[error("{0}")]
    AmbiguousCard(String),
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Not connected to Dropbox. Run `poic auth connect --token <TOKEN>` first.")]
    NotConnected,
    #[error("Dropbox rejected the stored credential. Run `poic auth connect` with a fresh token.")]
    Disconnected,
}
