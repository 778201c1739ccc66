//! User profile model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coins credited by one daily claim.
pub const DAILY_CLAIM_COINS: u64 = 10;
/// Engagement score credited by one daily claim.
pub const DAILY_CLAIM_SCORE: u64 = 5;
/// Maximum length of a user-edited display name, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 80;

/// User profile stored in Firestore (document ID = identity uid).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Identity uid from the session provider
    pub id: String,
    /// Email address (may be None if not shared)
    pub email: Option<String>,
    /// Display name (editable by the user)
    pub display_name: Option<String>,
    /// Profile picture URL
    pub photo_url: Option<String>,
    /// Admin flag
    #[serde(default)]
    pub is_privileged: bool,
    /// Coin balance
    #[serde(default)]
    pub coins: u64,
    /// Engagement score
    #[serde(default)]
    pub engagement_score: u64,
    /// Time of the last daily claim, stamped by the store
    #[serde(default, with = "firestore::serialize_as_optional_timestamp")]
    pub last_claim_at: Option<DateTime<Utc>>,
    /// When the profile was first created
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Fresh profile for a first-time identity.
    pub fn new(identity: &crate::models::Identity, now: DateTime<Utc>) -> Self {
        Self {
            id: identity.uid.clone(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            photo_url: identity.photo_url.clone(),
            is_privileged: identity.is_privileged,
            coins: 0,
            engagement_score: 0,
            last_claim_at: None,
            created_at: now,
        }
    }

    /// Reward fields of this profile.
    pub fn reward_state(&self) -> RewardState {
        RewardState {
            coins: self.coins,
            engagement_score: self.engagement_score,
            last_claim_at: self.last_claim_at,
        }
    }
}

/// Reward fields embedded in the profile document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewardState {
    pub coins: u64,
    pub engagement_score: u64,
    pub last_claim_at: Option<DateTime<Utc>>,
}

impl RewardState {
    /// State after one daily claim stamped at `claimed_at`.
    pub fn after_claim(&self, claimed_at: DateTime<Utc>) -> Self {
        Self {
            coins: self.coins.saturating_add(DAILY_CLAIM_COINS),
            engagement_score: self.engagement_score.saturating_add(DAILY_CLAIM_SCORE),
            last_claim_at: Some(claimed_at),
        }
    }
}

/// Partial profile update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub email: Option<Option<String>>,
    pub display_name: Option<Option<String>>,
    pub photo_url: Option<Option<String>>,
    pub is_privileged: Option<bool>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.display_name.is_none()
            && self.photo_url.is_none()
            && self.is_privileged.is_none()
    }

    /// Merge this patch into a profile in place.
    pub fn apply_to(&self, profile: &mut UserProfile) {
        if let Some(email) = &self.email {
            profile.email = email.clone();
        }
        if let Some(name) = &self.display_name {
            profile.display_name = name.clone();
        }
        if let Some(photo) = &self.photo_url {
            profile.photo_url = photo.clone();
        }
        if let Some(privileged) = self.is_privileged {
            profile.is_privileged = privileged;
        }
    }
}
