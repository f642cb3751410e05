//! Data models for PoIC

mod card;
mod patch;

pub use card::{normalize_tags, normalize_title, title_key, Card, CardId, CardKind};
pub use patch::CardPatch;
