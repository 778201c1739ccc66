// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: the `ProfileStore` port and its implementations.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{ProfilePatch, RewardState, TodoItem, UserProfile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    /// User profiles with embedded reward fields (keyed by uid)
    pub const PROFILES: &str = "profiles";
    /// List items for all users (keyed by item ID, filtered by `owner_id`)
    pub const TODO_ITEMS: &str = "todo_items";
}

/// Reward write issued by one daily claim.
///
/// Applied as a single conditional partial update: the store rejects it with
/// [`AppError::NotEligible`] when the stored `last_claim_at` is at or after
/// `not_claimed_since`, and stamps `last_claim_at` with its own clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimWrite {
    pub coins: u64,
    pub engagement_score: u64,
    /// Start of the viewer's current calendar day
    pub not_claimed_since: DateTime<Utc>,
}

impl ClaimWrite {
    /// Whether a profile with this last claim may be credited.
    pub fn permits(&self, last_claim_at: Option<DateTime<Utc>>) -> bool {
        last_claim_at.map_or(true, |last| last < self.not_claimed_since)
    }
}

/// Authoritative store for profiles, reward state and list items.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Point read of a profile.
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError>;

    /// Insert a profile if none exists. Returns whichever profile is stored afterwards.
    async fn create_profile(&self, profile: &UserProfile) -> Result<UserProfile, AppError>;

    /// Partial merge of non-reward fields.
    async fn update_profile(&self, uid: &str, patch: &ProfilePatch) -> Result<(), AppError>;

    /// Apply a daily claim and return the stored reward state.
    async fn apply_claim(&self, uid: &str, claim: &ClaimWrite) -> Result<RewardState, AppError>;

    /// All items owned by `owner_id`, newest first.
    async fn list_items(&self, owner_id: &str) -> Result<Vec<TodoItem>, AppError>;

    /// Insert a new incomplete item with a store-assigned ID and `created_at`.
    async fn add_list_item(&self, owner_id: &str, text: &str) -> Result<TodoItem, AppError>;

    /// Set `completed` on an item owned by `owner_id`.
    async fn update_list_item(
        &self,
        owner_id: &str,
        item_id: &str,
        completed: bool,
    ) -> Result<(), AppError>;

    /// Delete an item owned by `owner_id`.
    async fn delete_list_item(&self, owner_id: &str, item_id: &str) -> Result<(), AppError>;

    /// Reachability check for `/health`: one cheap round trip to the store.
    async fn health_check(&self) -> Result<(), AppError>;
}
