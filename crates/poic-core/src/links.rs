//! Backlink index
//!
//! Derives, on demand, which live cards wiki-reference a target title
//! and what else each of those referrers points at (the two-hop
//! neighborhood). Pure functions over the current card set; nothing is
//! maintained incrementally.

use regex::Regex;

use crate::models::{title_key, Card, CardId};

/// A card referencing the queried title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backlink {
    /// Referring card
    pub id: CardId,
    /// Referring card's title
    pub title: String,
    /// Other titles the referrer wiki-references, excluding itself and
    /// the query target
    pub onward: Vec<String>,
}

/// Find every live card (other than the target itself) whose body
/// contains `[[target_title]]`, case-insensitively.
#[must_use]
pub fn backlinks_for(cards: &[Card], target_title: &str) -> Vec<Backlink> {
    let Ok(pattern) = Regex::new(&format!(
        r"(?i)\[\[{}\]\]",
        regex::escape(target_title.trim())
    )) else {
        return Vec::new();
    };
    let target_key = title_key(target_title);

    cards
        .iter()
        .filter(|card| !card.deleted)
        .filter(|card| title_key(&card.title) != target_key)
        .filter(|card| pattern.is_match(&card.body))
        .map(|card| Backlink {
            id: card.id.clone(),
            title: card.title.clone(),
            onward: onward_references(card, &target_key),
        })
        .collect()
}

/// All wiki-references in a body, in order of first appearance,
/// deduplicated case-insensitively.
#[must_use]
pub fn wiki_references(body: &str) -> Vec<String> {
    let Ok(pattern) = Regex::new(r"\[\[([^\[\]]+)\]\]") else {
        return Vec::new();
    };

    let mut seen = Vec::new();
    let mut titles = Vec::new();
    for capture in pattern.captures_iter(body) {
        let title = capture[1].trim().to_string();
        let key = title_key(&title);
        if title.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        titles.push(title);
    }
    titles
}

fn onward_references(referrer: &Card, target_key: &str) -> Vec<String> {
    let own_key = title_key(&referrer.title);
    wiki_references(&referrer.body)
        .into_iter()
        .filter(|title| {
            let key = title_key(title);
            key != target_key && key != own_key
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::models::CardKind;

    use super::*;

    fn card(title: &str, body: &str) -> Card {
        let mut card = Card::new(title, CardKind::Record);
        card.body = body.to_string();
        card
    }

    #[test]
    fn backlinks_and_two_hop_extraction() {
        let cards = vec![
            card("A", "see [[B]]"),
            card("B", "see [[A]] and [[C]]"),
            card("C", "no links here"),
        ];

        let for_b = backlinks_for(&cards, "B");
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].title, "A");
        assert!(for_b[0].onward.is_empty());

        let for_a = backlinks_for(&cards, "A");
        assert_eq!(for_a.len(), 1);
        assert_eq!(for_a[0].title, "B");
        assert_eq!(for_a[0].onward, vec!["C".to_string()]);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let cards = vec![card("Daily Log", "roll up into [[weekly review]]")];
        let links = backlinks_for(&cards, "Weekly Review");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, "Daily Log");
    }

    #[test]
    fn target_title_with_regex_metacharacters_is_escaped() {
        let cards = vec![card("Notes", "covered in [[C++ (basics)]]")];
        let links = backlinks_for(&cards, "C++ (basics)");
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn tombstoned_referrers_are_excluded() {
        let mut dead = card("Dead", "points at [[Target]]");
        dead.tombstone(1_000);
        let cards = vec![dead, card("Alive", "also [[Target]]")];

        let links = backlinks_for(&cards, "Target");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, "Alive");
    }

    #[test]
    fn target_card_itself_is_not_its_own_backlink() {
        let cards = vec![card("Self", "links to [[Self]]")];
        assert!(backlinks_for(&cards, "Self").is_empty());
    }

    #[test]
    fn wiki_references_dedupe_case_insensitively_in_order() {
        let refs = wiki_references("[[One]] then [[two]] then [[ONE]] and [[Three]]");
        assert_eq!(
            refs,
            vec!["One".to_string(), "two".to_string(), "Three".to_string()]
        );
    }

    #[test]
    fn wiki_references_ignore_empty_brackets() {
        assert!(wiki_references("nothing [[ ]] here").is_empty());
    }
}
