use std::path::Path;

use poic_core::collection::CardCollection;
use poic_core::db::LibSqlKvStore;
use poic_core::models::CardPatch;
use poic_core::sync::ChangeTracker;
use poic_core::util::now_ms;

use crate::commands::common::{
    capture_editor_input_with_initial, open_database, resolve_card, save_state,
};
use crate::error::CliError;

pub async fn run_edit(query: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let kv = LibSqlKvStore::new(db.connection());
    let mut collection = CardCollection::load(&kv).await?;
    let mut tracker = ChangeTracker::load(&kv).await?;

    let card = resolve_card(&collection, query)?;
    let edited = capture_editor_input_with_initial(&card.body)?.unwrap_or_default();

    if edited == card.body {
        println!("{}", card.id);
        return Ok(());
    }

    let patch = CardPatch {
        body: Some(edited),
        ..CardPatch::default()
    };
    let outcome = collection.apply_patch(&card.id, patch, now_ms())?;
    if outcome.changed {
        tracker.mark_dirty(card.id.clone());
        save_state(&kv, &collection, &tracker).await?;
    }

    println!("{}", card.id);
    Ok(())
}
