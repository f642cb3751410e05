//! poic-core - Core library for PoIC
//!
//! Cards, their durable text codec, the local collection and key/value
//! persistence, the Dropbox remote store adapter, and the sync engine
//! that reconciles the two with last-write-wins timestamps and
//! tombstone deletion.

pub mod auth;
pub mod codec;
pub mod collection;
pub mod config;
pub mod db;
pub mod error;
pub mod links;
pub mod models;
pub mod remote;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Card, CardId, CardKind, CardPatch};
