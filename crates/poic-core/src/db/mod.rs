//! Local durable storage
//!
//! A small libSQL database holding a key/value table: the card
//! collection persists as one JSON document under a single key, plus
//! settings, the stored credential, and the legacy-import marker.

mod connection;
mod kv;
mod migrations;

pub use connection::Database;
pub use kv::{KeyValueStore, LibSqlKvStore};
