use std::path::Path;

use poic_core::collection::CardCollection;
use poic_core::config::Settings;
use poic_core::db::LibSqlKvStore;
use poic_core::links::backlinks_for;
use poic_core::models::CardKind;

use crate::commands::common::{format_by_pattern, open_database, render_tags, resolve_card};
use crate::error::CliError;

pub async fn run_show(query: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let kv = LibSqlKvStore::new(db.connection());
    let collection = CardCollection::load(&kv).await?;
    let settings = Settings::load(&kv).await?;

    let card = resolve_card(&collection, query)?;

    println!("{}  [{}]", card.title, card.kind);
    println!("id:      {}", card.id);
    println!(
        "created: {}",
        format_by_pattern(card.created_at, &settings.date_format)
    );
    println!(
        "updated: {}",
        format_by_pattern(card.updated_at, &settings.date_format)
    );
    if card.kind == CardKind::Task {
        if let Some(due_date) = card.due_date {
            println!("due:     {}", format_by_pattern(due_date, &settings.date_format));
        }
        println!(
            "status:  {}",
            if card.completed.unwrap_or(false) {
                "done"
            } else {
                "open"
            }
        );
    }
    if let Some(pinned_at) = card.pinned_at {
        println!(
            "pinned:  {}",
            format_by_pattern(pinned_at, &settings.date_format)
        );
    }
    let tags = render_tags(&card);
    if !tags.is_empty() {
        println!("tags:    {tags}");
    }

    if !card.body.is_empty() {
        println!();
        println!("{}", card.body);
    }

    let backlinks = backlinks_for(collection.cards(), &card.title);
    if !backlinks.is_empty() {
        println!();
        println!("Linked from:");
        for backlink in backlinks {
            if backlink.onward.is_empty() {
                println!("  {}", backlink.title);
            } else {
                println!("  {}  (also links: {})", backlink.title, backlink.onward.join(", "));
            }
        }
    }

    Ok(())
}
