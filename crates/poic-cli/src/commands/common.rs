use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Datelike, Local, TimeZone, Timelike, Utc};
use poic_core::collection::{import_legacy_export, CardCollection};
use poic_core::db::{Database, KeyValueStore, LibSqlKvStore};
use poic_core::models::{Card, CardId};
use poic_core::sync::ChangeTracker;
use serde::Serialize;

use crate::error::CliError;

/// JSON shape for `poic list --json`.
#[derive(Debug, Serialize)]
pub struct CardListItem {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub preview: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
    pub tags: Vec<String>,
    pub pinned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("POIC_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("poic")
        .join("poic.db")
}

/// Open the database, running the one-shot legacy import alongside it.
pub async fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = Database::open(path).await?;
    let kv = LibSqlKvStore::new(db.connection());
    let legacy_path = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("poic_data.json");
    import_legacy_export(&kv, &legacy_path).await?;

    Ok(db)
}

/// Persist the collection and the pending dirty set together after a
/// mutation; a storage failure here must surface, not pass silently.
pub async fn save_state(
    kv: &impl KeyValueStore,
    collection: &CardCollection,
    tracker: &ChangeTracker,
) -> Result<(), CliError> {
    collection.persist(kv).await?;
    tracker.persist(kv).await?;
    Ok(())
}

/// Resolve a card by exact id, unique id prefix, or exact title.
pub fn resolve_card(collection: &CardCollection, query: &str) -> Result<Card, CliError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CliError::CardNotFound(query.to_string()));
    }

    if let Some(card) = collection.get(&CardId::from(query)) {
        if !card.deleted {
            return Ok(card.clone());
        }
    }

    if let Some(card) = collection.find_live_by_title(query) {
        return Ok(card.clone());
    }

    let matches: Vec<&Card> = collection
        .live()
        .filter(|card| card.id.as_str().starts_with(query))
        .collect();

    match matches.len() {
        0 => Err(CliError::CardNotFound(query.to_string())),
        1 => Ok(matches[0].clone()),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|card| card.id.as_str().chars().take(13).collect::<String>())
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousCard(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// List ordering: pinned cards first (oldest pin first), then newest
/// created first.
pub fn sort_for_list(cards: &mut [&Card]) {
    cards.sort_by(|a, b| match (a.pinned_at, b.pinned_at) {
        (Some(pin_a), Some(pin_b)) => pin_a.cmp(&pin_b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.created_at.cmp(&a.created_at),
    });
}

pub fn format_card_lines(cards: &[&Card]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    cards
        .iter()
        .map(|card| {
            let short_id = card.id.as_str().chars().take(13).collect::<String>();
            let pin = if card.is_pinned() { "*" } else { " " };
            let title = clip_text(&card.title, 32);
            let relative_time = format_relative_time(card.updated_at, now_ms);
            let tags = render_tags(card);

            if tags.is_empty() {
                format!("{short_id:<13} {pin} {:<9}  {title:<32}  {relative_time}", card.kind)
            } else {
                format!(
                    "{short_id:<13} {pin} {:<9}  {title:<32}  {relative_time:<10}  {tags}",
                    card.kind
                )
            }
        })
        .collect()
}

pub fn card_to_list_item(card: &Card) -> CardListItem {
    let now_ms = Utc::now().timestamp_millis();
    CardListItem {
        id: card.id.to_string(),
        kind: card.kind.to_string(),
        title: card.title.clone(),
        preview: clip_text(card.body.lines().next().unwrap_or(""), 80),
        created_at: card.created_at,
        updated_at: card.updated_at,
        relative_time: format_relative_time(card.updated_at, now_ms),
        tags: card.tags.clone(),
        pinned: card.is_pinned(),
        due_date: card.due_date,
        completed: card.completed,
    }
}

pub fn render_tags(card: &Card) -> String {
    card.tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn clip_text(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Render a timestamp using the display pattern from settings
/// (`YYYY`, `MM`, `DD`, `ddd`, `HH`, `mm` tokens).
pub fn format_by_pattern(timestamp_ms: i64, pattern: &str) -> String {
    let Some(date_time) = Local.timestamp_millis_opt(timestamp_ms).single() else {
        return timestamp_ms.to_string();
    };

    pattern
        .replace("YYYY", &format!("{:04}", date_time.year()))
        .replace("ddd", &date_time.format("%a").to_string())
        .replace("MM", &format!("{:02}", date_time.month()))
        .replace("DD", &format!("{:02}", date_time.day()))
        .replace("HH", &format!("{:02}", date_time.hour()))
        .replace("mm", &format!("{:02}", date_time.minute()))
}

/// Parse a `YYYY-MM-DD` due date into Unix ms at local midnight.
pub fn parse_due_date(raw: &str) -> Result<i64, CliError> {
    let date = chrono::NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| CliError::InvalidDate(raw.to_string()))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CliError::InvalidDate(raw.to_string()))?;
    let local = Local
        .from_local_datetime(&midnight)
        .single()
        .ok_or_else(|| CliError::InvalidDate(raw.to_string()))?;
    Ok(local.timestamp_millis())
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_card_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let card_body = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&card_body))
}

fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // Fallback for editor commands with args, e.g. "code --wait"
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_card_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("poic-card-{}-{now}.md", std::process::id()))
}
