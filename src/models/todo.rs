// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-identity to-do / shopping list items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of an item's text, in characters.
pub const MAX_TODO_TEXT_LEN: usize = 500;

/// List item stored in Firestore (document ID = `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    /// Store-assigned ID, unique within the owner's list
    pub id: String,
    /// Owning identity uid
    pub owner_id: String,
    /// Trimmed, non-empty text
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    /// Store-assigned creation time (list order key)
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Complete, ordered materialization of one identity's list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListSnapshot {
    /// Items ordered by `created_at` descending (newest first)
    pub items: Vec<TodoItem>,
    /// Per-subscription sequence number, starting at 1
    pub revision: u64,
}

/// Order items newest first. Ties fall back to ID so snapshots are stable.
pub fn sort_newest_first(items: &mut [TodoItem]) {
    items.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Trim submitted text. Returns `None` when nothing is left.
pub fn normalize_text(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
