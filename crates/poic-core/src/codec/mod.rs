//! Card text codec
//!
//! Maps a card to its durable text form: a `---` delimited metadata
//! header (key/value lines, tags as bullet items), a blank line, then the
//! raw body. The decoder is deliberately tolerant: unknown keys are
//! ignored, missing fields fall back, and plain text without a header
//! still yields a card.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{normalize_tags, Card, CardId, CardKind};
use crate::util::now_ms;

/// File extension for encoded cards in the remote store.
pub const FILE_EXTENSION: &str = "md";

const HEADER_OPEN: &str = "---\n";

/// Serialize a card to its text representation.
#[must_use]
pub fn encode(card: &Card) -> String {
    let mut out = String::new();
    out.push_str(HEADER_OPEN);

    let _ = writeln!(out, "id: {}", escape_value(card.id.as_str()));
    let _ = writeln!(out, "kind: {}", card.kind.as_str());
    let _ = writeln!(out, "title: {}", escape_value(&card.title));
    let _ = writeln!(out, "created_at: {}", format_timestamp(card.created_at));
    let _ = writeln!(out, "updated_at: {}", format_timestamp(card.updated_at));
    if let Some(due_date) = card.due_date {
        let _ = writeln!(out, "due_date: {}", format_timestamp(due_date));
    }
    if let Some(completed) = card.completed {
        let _ = writeln!(out, "completed: {completed}");
    }
    if let Some(pinned_at) = card.pinned_at {
        let _ = writeln!(out, "pinned_at: {}", format_timestamp(pinned_at));
    }
    let _ = writeln!(out, "deleted: {}", card.deleted);
    if let Some(deleted_at) = card.deleted_at {
        let _ = writeln!(out, "deleted_at: {}", format_timestamp(deleted_at));
    }
    let _ = writeln!(out, "tags:");
    for tag in &card.tags {
        let _ = writeln!(out, "  - {}", escape_value(tag));
    }

    out.push_str("---\n");
    out.push('\n');
    out.push_str(&card.body);
    out
}

/// Parse a card from its text representation.
///
/// Never fails on plain text: input without a metadata header synthesizes
/// a minimal card named after `fallback_name`. Returns `None` only for a
/// malformed header (opening marker without a closing one).
#[must_use]
pub fn decode(text: &str, fallback_name: &str) -> Option<Card> {
    let Some((header, body)) = split_header(text) else {
        if has_header_marker(text) {
            // Opening marker but no terminator: malformed, skip the file.
            return None;
        }
        return Some(fallback_card(fallback_name, text));
    };

    let mut fields: Vec<(&str, String)> = Vec::new();
    let mut tags: Vec<String> = Vec::new();
    let mut list_key: Option<&str> = None;

    for line in header.lines() {
        if let Some(item) = line.strip_prefix("  - ") {
            if list_key == Some("tags") {
                tags.push(unescape_value(item.trim()));
            }
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if value.is_empty() {
            list_key = Some(key);
        } else {
            list_key = None;
            fields.push((key, unescape_value(value)));
        }
    }

    let field = |name: &str| {
        fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    };

    let now = now_ms();
    let title = field("title")
        .filter(|value| !value.trim().is_empty())
        .map_or_else(|| display_name(fallback_name), ToString::to_string);
    let id = field("id")
        .filter(|value| !value.trim().is_empty())
        .map_or_else(|| CardId::from_seed(fallback_name), CardId::from);

    Some(Card {
        id,
        kind: field("kind").map(CardKind::parse_lossy).unwrap_or_default(),
        title,
        body: body.to_string(),
        created_at: field("created_at").and_then(parse_timestamp).unwrap_or(now),
        updated_at: field("updated_at").and_then(parse_timestamp).unwrap_or(now),
        due_date: field("due_date").and_then(parse_timestamp),
        completed: field("completed").and_then(parse_bool),
        tags: normalize_tags(tags),
        pinned_at: field("pinned_at").and_then(parse_timestamp),
        deleted: field("deleted").and_then(parse_bool).unwrap_or(false),
        deleted_at: field("deleted_at").and_then(parse_timestamp),
    })
}

/// Split text into (header contents, body), or `None` when there is no
/// complete header.
fn split_header(text: &str) -> Option<(&str, &str)> {
    let after_open = text.strip_prefix(HEADER_OPEN)?;

    let (header_end, body_start) = if after_open.starts_with("---\n") {
        (0, 4)
    } else if after_open == "---" {
        (0, 3)
    } else if let Some(idx) = after_open.find("\n---\n") {
        (idx + 1, idx + 5)
    } else if after_open.ends_with("\n---") {
        (after_open.len() - 3, after_open.len())
    } else {
        return None;
    };

    let header = &after_open[..header_end];
    let body = &after_open[body_start..];
    // One blank separator line belongs to the encoding, not the body.
    Some((header, body.strip_prefix('\n').unwrap_or(body)))
}

fn has_header_marker(text: &str) -> bool {
    text == "---" || text.starts_with(HEADER_OPEN)
}

fn fallback_card(fallback_name: &str, body: &str) -> Card {
    let now = now_ms();
    Card {
        id: CardId::from_seed(fallback_name),
        kind: CardKind::default(),
        title: display_name(fallback_name),
        body: body.to_string(),
        created_at: now,
        updated_at: now,
        due_date: None,
        completed: None,
        tags: Vec::new(),
        pinned_at: None,
        deleted: false,
        deleted_at: None,
    }
}

fn display_name(fallback_name: &str) -> String {
    let trimmed = fallback_name.trim();
    if trimmed.is_empty() {
        "Untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

fn parse_timestamp(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|date_time| date_time.timestamp_millis())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Quote a value whose text would be ambiguous in `key: value` form.
fn escape_value(value: &str) -> String {
    let needs_quoting = value.contains(':')
        || value.starts_with('"')
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace);
    if !needs_quoting {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn unescape_value(value: &str) -> String {
    if value.len() < 2 || !value.starts_with('"') || !value.ends_with('"') {
        return value.to_string();
    }

    let inner = &value[1..value.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn full_card() -> Card {
        Card {
            id: CardId::from("0192d7a0-0000-7000-8000-000000000001"),
            kind: CardKind::Task,
            title: "Ship release: v2".to_string(),
            body: "Remember [[Checklist]]\n\n#launch".to_string(),
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_123_456,
            due_date: Some(1_700_100_000_000),
            completed: Some(false),
            tags: vec!["launch".to_string(), "work".to_string()],
            pinned_at: Some(1_700_000_200_000),
            deleted: true,
            deleted_at: Some(1_700_000_300_000),
        }
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let card = full_card();
        let decoded = decode(&encode(&card), "unrelated").unwrap();
        assert_eq!(decoded, card);
    }

    #[test]
    fn round_trip_preserves_trailing_newline_in_body() {
        let mut card = full_card();
        card.body = "line one\nline two\n".to_string();
        let decoded = decode(&encode(&card), "unrelated").unwrap();
        assert_eq!(decoded.body, card.body);
    }

    #[test]
    fn encode_emits_iso_timestamps_and_bullet_tags() {
        let text = encode(&full_card());
        assert!(text.starts_with("---\n"));
        assert!(text.contains("created_at: 2023-11-14T22:13:20.000Z"));
        assert!(text.contains("kind: Task"));
        assert!(text.contains("tags:\n  - launch\n  - work"));
        assert!(text.contains("deleted: true"));
    }

    #[test]
    fn encode_omits_absent_optional_fields() {
        let card = Card::new("Plain", CardKind::Record);
        let text = encode(&card);
        assert!(!text.contains("due_date:"));
        assert!(!text.contains("completed:"));
        assert!(!text.contains("pinned_at:"));
        assert!(!text.contains("deleted_at:"));
        assert!(text.contains("deleted: false"));
    }

    #[test]
    fn encode_quotes_titles_containing_the_delimiter() {
        let mut card = Card::new("Meeting: weekly", CardKind::Record);
        card.body = String::new();
        let text = encode(&card);
        assert!(text.contains("title: \"Meeting: weekly\""));

        let decoded = decode(&text, "fallback").unwrap();
        assert_eq!(decoded.title, "Meeting: weekly");
    }

    #[test]
    fn decode_plain_text_synthesizes_card() {
        let card = decode("just some plain text", "My Note").unwrap();
        assert_eq!(card.title, "My Note");
        assert_eq!(card.kind, CardKind::Record);
        assert_eq!(card.body, "just some plain text");
        assert!(card.tags.is_empty());
        assert!(card.created_at > 0);
        assert!(card.updated_at > 0);
        assert!(!card.deleted);
    }

    #[test]
    fn decode_missing_title_falls_back_to_name() {
        let text = "---\nid: abc\nkind: Record\ndeleted: false\ntags:\n---\n\nhello";
        let card = decode(text, "Recovered").unwrap();
        assert_eq!(card.title, "Recovered");
        assert_eq!(card.id, CardId::from("abc"));
        assert_eq!(card.body, "hello");
    }

    #[test]
    fn decode_missing_id_is_seeded_from_fallback() {
        let text = "---\ntitle: Has Title\ndeleted: false\ntags:\n---\n\nbody";
        let card = decode(text, "file-stem").unwrap();
        assert_eq!(card.id, CardId::from("file-stem"));
        assert_eq!(card.title, "Has Title");
    }

    #[test]
    fn decode_ignores_unknown_keys_and_their_list_items() {
        let text = "---\ntitle: Known\ncolor: teal\nattachments:\n  - a.png\n  - b.png\ntags:\n  - keep\n---\n\nbody";
        let card = decode(text, "fallback").unwrap();
        assert_eq!(card.title, "Known");
        assert_eq!(card.tags, vec!["keep".to_string()]);
    }

    #[test]
    fn decode_unknown_kind_defaults_to_record() {
        let text = "---\ntitle: T\nkind: GTD\ntags:\n---\n\n";
        let card = decode(text, "fallback").unwrap();
        assert_eq!(card.kind, CardKind::Record);
    }

    #[test]
    fn decode_unterminated_header_is_malformed() {
        assert!(decode("---\ntitle: broken\nno closing marker", "x").is_none());
        assert!(decode("---", "x").is_none());
    }

    #[test]
    fn decode_empty_text_synthesizes_untitled() {
        let card = decode("", "  ").unwrap();
        assert_eq!(card.title, "Untitled");
        assert_eq!(card.body, "");
    }

    #[test]
    fn escape_round_trip() {
        for value in [
            "plain",
            "with: colon",
            "\"quoted\"",
            " leading space",
            "back\\slash: yes",
        ] {
            assert_eq!(unescape_value(&escape_value(value)), value);
        }
    }
}
