use std::path::Path;

use poic_core::collection::CardCollection;
use poic_core::db::LibSqlKvStore;
use poic_core::models::{Card, CardKind};

use crate::cli::KindArg;
use crate::commands::common::{
    card_to_list_item, format_card_lines, open_database, sort_for_list, CardListItem,
};
use crate::error::CliError;

pub async fn run_list(
    limit: usize,
    kind: Option<KindArg>,
    tag: Option<&str>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let kv = LibSqlKvStore::new(db.connection());
    let collection = CardCollection::load(&kv).await?;

    let kind_filter: Option<CardKind> = kind.map(Into::into);
    let mut cards: Vec<&Card> = collection
        .live()
        .filter(|card| kind_filter.is_none_or(|kind| card.kind == kind))
        .filter(|card| {
            tag.is_none_or(|tag| card.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
        })
        .collect();

    sort_for_list(&mut cards);
    cards.truncate(limit);

    if as_json {
        let items = cards
            .iter()
            .map(|card| card_to_list_item(card))
            .collect::<Vec<CardListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_card_lines(&cards) {
            println!("{line}");
        }
    }

    Ok(())
}
