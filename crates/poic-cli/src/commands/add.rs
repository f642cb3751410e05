use std::path::Path;

use poic_core::collection::{CardCollection, NewCard};
use poic_core::db::LibSqlKvStore;
use poic_core::sync::ChangeTracker;

use crate::cli::KindArg;
use crate::commands::common::{open_database, parse_due_date, read_piped_stdin, save_state};
use crate::error::CliError;

pub async fn run_add(
    title: &str,
    body_parts: &[String],
    kind: KindArg,
    tags: &[String],
    due: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let body = if body_parts.is_empty() {
        read_piped_stdin()?.unwrap_or_default()
    } else {
        body_parts.join(" ")
    };
    let due_date = due.map(parse_due_date).transpose()?;

    let db = open_database(db_path).await?;
    let kv = LibSqlKvStore::new(db.connection());
    let mut collection = CardCollection::load(&kv).await?;
    let mut tracker = ChangeTracker::load(&kv).await?;

    let id = collection.create(NewCard {
        title: title.to_string(),
        kind: kind.into(),
        body,
        tags: tags.to_vec(),
        due_date,
    })?;
    tracker.mark_dirty(id.clone());
    save_state(&kv, &collection, &tracker).await?;

    println!("{id}");
    Ok(())
}
