use std::path::Path;

use poic_core::collection::CardCollection;
use poic_core::db::LibSqlKvStore;
use poic_core::models::CardPatch;
use poic_core::sync::ChangeTracker;
use poic_core::util::now_ms;

use crate::commands::common::{open_database, resolve_card, save_state};
use crate::error::CliError;

pub async fn run_rename(query: &str, new_title: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let kv = LibSqlKvStore::new(db.connection());
    let mut collection = CardCollection::load(&kv).await?;
    let mut tracker = ChangeTracker::load(&kv).await?;

    let card = resolve_card(&collection, query)?;
    let patch = CardPatch {
        title: Some(new_title.to_string()),
        ..CardPatch::default()
    };
    let outcome = collection.apply_patch(&card.id, patch, now_ms())?;

    if outcome.changed {
        match outcome.renamed_from {
            Some(old_title) => tracker.mark_renamed(card.id.clone(), old_title),
            None => tracker.mark_dirty(card.id.clone()),
        }
        for relinked in &outcome.relinked {
            tracker.mark_dirty(relinked.clone());
        }
        save_state(&kv, &collection, &tracker).await?;

        if !outcome.relinked.is_empty() {
            println!("Updated links in {} card(s)", outcome.relinked.len());
        }
    }

    println!("{}", card.id);
    Ok(())
}
