// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process profile store.
//!
//! Used for local development (`STORE_BACKEND=memory`) and tests. Writes are
//! applied under per-key map locks, so a claim is atomic with respect to
//! other writers in the same process.

use crate::db::{ClaimWrite, ProfileStore};
use crate::error::AppError;
use crate::models::todo::sort_newest_first;
use crate::models::{ProfilePatch, RewardState, TodoItem, UserProfile};
use crate::time_utils::{system_clock, Clock};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Mutex;

/// Profile store kept entirely in memory.
pub struct MemoryStore {
    profiles: DashMap<String, UserProfile>,
    /// Items grouped by owner uid
    items: DashMap<String, Vec<TodoItem>>,
    clock: Clock,
    /// Last assigned `created_at`, kept strictly increasing
    last_created_at: Mutex<Option<DateTime<Utc>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Store whose server timestamps come from `clock`.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            profiles: DashMap::new(),
            items: DashMap::new(),
            clock,
            last_created_at: Mutex::new(None),
        }
    }

    /// Server timestamp for a new item. Never repeats, even within one clock tick.
    fn next_created_at(&self) -> Result<DateTime<Utc>, AppError> {
        let mut last = self
            .last_created_at
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("created_at lock poisoned")))?;
        let mut now = (self.clock)();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        Ok(now)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.profiles.get(uid).map(|p| p.clone()))
    }

    async fn create_profile(&self, profile: &UserProfile) -> Result<UserProfile, AppError> {
        Ok(self
            .profiles
            .entry(profile.id.clone())
            .or_insert_with(|| profile.clone())
            .clone())
    }

    async fn update_profile(&self, uid: &str, patch: &ProfilePatch) -> Result<(), AppError> {
        let mut profile = self
            .profiles
            .get_mut(uid)
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", uid)))?;
        patch.apply_to(&mut profile);
        Ok(())
    }

    async fn apply_claim(&self, uid: &str, claim: &ClaimWrite) -> Result<RewardState, AppError> {
        let now = (self.clock)();
        let mut profile = self.profiles.entry(uid.to_string()).or_insert_with(|| {
            UserProfile::new(&crate::models::Identity::from_uid(uid), now)
        });

        if !claim.permits(profile.last_claim_at) {
            return Err(AppError::NotEligible);
        }

        profile.coins = profile.coins.saturating_add(claim.coins);
        profile.engagement_score = profile
            .engagement_score
            .saturating_add(claim.engagement_score);
        profile.last_claim_at = Some(now);

        Ok(profile.reward_state())
    }

    async fn list_items(&self, owner_id: &str) -> Result<Vec<TodoItem>, AppError> {
        let mut items = self
            .items
            .get(owner_id)
            .map(|list| list.clone())
            .unwrap_or_default();
        sort_newest_first(&mut items);
        Ok(items)
    }

    async fn add_list_item(&self, owner_id: &str, text: &str) -> Result<TodoItem, AppError> {
        let item = TodoItem {
            id: uuid::Uuid::new_v4().simple().to_string(),
            owner_id: owner_id.to_string(),
            text: text.to_string(),
            completed: false,
            created_at: self.next_created_at()?,
        };
        self.items
            .entry(owner_id.to_string())
            .or_default()
            .push(item.clone());
        Ok(item)
    }

    async fn update_list_item(
        &self,
        owner_id: &str,
        item_id: &str,
        completed: bool,
    ) -> Result<(), AppError> {
        let mut list = self
            .items
            .get_mut(owner_id)
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item_id)))?;
        let item = list
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item_id)))?;
        item.completed = completed;
        Ok(())
    }

    async fn delete_list_item(&self, owner_id: &str, item_id: &str) -> Result<(), AppError> {
        let mut list = self
            .items
            .get_mut(owner_id)
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item_id)))?;
        let before = list.len();
        list.retain(|i| i.id != item_id);
        if list.len() == before {
            return Err(AppError::NotFound(format!("Item {} not found", item_id)));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
