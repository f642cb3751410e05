//! Partial card updates

use serde::{Deserialize, Serialize};

use super::card::{normalize_tags, Card, CardKind};

/// An explicit partial update over a card's mutable content fields.
///
/// Every field listed here is content-bearing: applying a patch bumps
/// `updated_at` exactly when at least one field actually changes value.
/// Fields with an outer `None` are left untouched; double-`Option`
/// fields use the inner `None` to clear the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPatch {
    pub kind: Option<CardKind>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub due_date: Option<Option<i64>>,
    pub completed: Option<Option<bool>>,
    pub tags: Option<Vec<String>>,
    pub pinned_at: Option<Option<i64>>,
}

impl CardPatch {
    /// Whether this patch touches no fields at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.title.is_none()
            && self.body.is_none()
            && self.due_date.is_none()
            && self.completed.is_none()
            && self.tags.is_none()
            && self.pinned_at.is_none()
    }
}

impl Card {
    /// Apply a patch, stamping `updated_at` only if observable content
    /// actually changed. Returns whether it did.
    pub fn apply(&mut self, patch: &CardPatch, now: i64) -> bool {
        let mut changed = false;

        if let Some(kind) = patch.kind {
            changed |= replace(&mut self.kind, kind);
        }
        if let Some(title) = &patch.title {
            changed |= replace(&mut self.title, title.clone());
        }
        if let Some(body) = &patch.body {
            changed |= replace(&mut self.body, body.clone());
        }
        if let Some(due_date) = patch.due_date {
            changed |= replace(&mut self.due_date, due_date);
        }
        if let Some(completed) = patch.completed {
            changed |= replace(&mut self.completed, completed);
        }
        if let Some(tags) = &patch.tags {
            changed |= replace(&mut self.tags, normalize_tags(tags.clone()));
        }
        if let Some(pinned_at) = patch.pinned_at {
            changed |= replace(&mut self.pinned_at, pinned_at);
        }

        if changed {
            self.updated_at = now;
        }
        changed
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn base_card() -> Card {
        let mut card = Card::new("Groceries", CardKind::Task);
        card.body = "Buy [[Milk]]".to_string();
        card.updated_at = 1_000;
        card
    }

    #[test]
    fn apply_bumps_updated_at_on_content_change() {
        let mut card = base_card();
        let patch = CardPatch {
            body: Some("Buy [[Milk]] and eggs".to_string()),
            ..CardPatch::default()
        };

        assert!(card.apply(&patch, 2_000));
        assert_eq!(card.updated_at, 2_000);
        assert_eq!(card.body, "Buy [[Milk]] and eggs");
    }

    #[test]
    fn apply_is_noop_when_values_are_unchanged() {
        let mut card = base_card();
        let patch = CardPatch {
            body: Some(card.body.clone()),
            kind: Some(card.kind),
            ..CardPatch::default()
        };

        assert!(!card.apply(&patch, 2_000));
        assert_eq!(card.updated_at, 1_000);
    }

    #[test]
    fn apply_empty_patch_does_not_bump() {
        let mut card = base_card();
        assert!(!card.apply(&CardPatch::default(), 2_000));
        assert_eq!(card.updated_at, 1_000);
    }

    #[test]
    fn apply_clears_due_date_with_inner_none() {
        let mut card = base_card();
        card.due_date = Some(5_000);

        let patch = CardPatch {
            due_date: Some(None),
            ..CardPatch::default()
        };
        assert!(card.apply(&patch, 2_000));
        assert_eq!(card.due_date, None);
    }

    #[test]
    fn apply_normalizes_tags() {
        let mut card = base_card();
        let patch = CardPatch {
            tags: Some(vec!["b".to_string(), "a".to_string(), "b".to_string()]),
            ..CardPatch::default()
        };

        assert!(card.apply(&patch, 2_000));
        assert_eq!(card.tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn apply_pin_state_is_content_bearing() {
        let mut card = base_card();
        let patch = CardPatch {
            pinned_at: Some(Some(1_500)),
            ..CardPatch::default()
        };

        assert!(card.apply(&patch, 2_000));
        assert_eq!(card.pinned_at, Some(1_500));
        assert_eq!(card.updated_at, 2_000);
    }
}
