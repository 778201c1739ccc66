// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily reward claims and the local reward-state mirror.
//!
//! Eligibility is a calendar-day rule in the viewer's time zone, not a
//! rolling 24-hour window: a claim at 23:59 and another at 00:01 the next
//! day are both valid.

use crate::db::{ClaimWrite, ProfileStore};
use crate::error::AppError;
use crate::models::user::{DAILY_CLAIM_COINS, DAILY_CLAIM_SCORE};
use crate::models::{Identity, RewardState};
use crate::time_utils::{local_date, start_of_local_day, start_of_next_local_day, Clock};
use chrono::{DateTime, FixedOffset, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared per-identity claim locks.
pub type ClaimLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Whether a claim is allowed at `now` given the last claim time.
///
/// Compares calendar dates in the viewer's zone; an absent last claim
/// (first-time user) is always eligible.
pub fn is_claim_eligible(
    last_claim_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> bool {
    match last_claim_at {
        None => true,
        Some(last) => local_date(last, offset) < local_date(now, offset),
    }
}

/// Reward state plus claim availability, as shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimStatus {
    pub state: RewardState,
    pub can_claim: bool,
    /// A claim for this identity is pending on this instance
    pub claim_in_flight: bool,
    /// When the next claim opens (start of the viewer's next day) if not claimable now
    pub next_claim_at: Option<DateTime<Utc>>,
}

/// Gates and applies the once-per-day reward claim.
#[derive(Clone)]
pub struct EngagementService {
    store: Arc<dyn ProfileStore>,
    clock: Clock,
    /// Last known reward state per uid, updated from reads and successful claims.
    reward_cache: Arc<DashMap<String, RewardState>>,
    /// Single-flight guard: at most one claim in progress per uid.
    claim_locks: ClaimLocks,
}

impl EngagementService {
    pub fn new(store: Arc<dyn ProfileStore>, clock: Clock) -> Self {
        Self {
            store,
            clock,
            reward_cache: Arc::new(DashMap::new()),
            claim_locks: Arc::new(DashMap::new()),
        }
    }

    /// Last reward state this instance saw for `uid`, without a store read.
    ///
    /// Diagnostic view of the local mirror; request handlers always go
    /// through [`EngagementService::reward_status`].
    pub fn cached_reward_state(&self, uid: &str) -> Option<RewardState> {
        self.reward_cache.get(uid).map(|s| *s)
    }

    /// Whether a claim for `uid` is currently in flight on this instance.
    ///
    /// Reported to the dashboard as `claim_in_flight` so it can keep the
    /// claim control disabled until the pending claim settles.
    pub fn is_claim_in_flight(&self, uid: &str) -> bool {
        self.claim_locks
            .get(uid)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Read the authoritative reward state and refresh the local mirror.
    ///
    /// A missing profile reads as the default state (zero balance, never claimed).
    async fn load_reward_state(&self, uid: &str) -> Result<RewardState, AppError> {
        let state = self
            .store
            .get_profile(uid)
            .await?
            .map(|p| p.reward_state())
            .unwrap_or_default();
        self.reward_cache.insert(uid.to_string(), state);
        Ok(state)
    }

    /// Current reward state and claim availability for the viewer.
    pub async fn reward_status(
        &self,
        identity: &Identity,
        offset: FixedOffset,
    ) -> Result<ClaimStatus, AppError> {
        let state = self.load_reward_state(&identity.uid).await?;
        let now = (self.clock)();
        let eligible = is_claim_eligible(state.last_claim_at, now, offset);
        let claim_in_flight = self.is_claim_in_flight(&identity.uid);

        Ok(ClaimStatus {
            state,
            can_claim: eligible && !claim_in_flight,
            claim_in_flight,
            next_claim_at: (!eligible).then(|| start_of_next_local_day(now, offset)),
        })
    }

    /// Whether the viewer may claim today.
    ///
    /// Store errors propagate: eligibility is never assumed when the
    /// profile cannot be read.
    pub async fn check_claim_eligibility(
        &self,
        identity: &Identity,
        offset: FixedOffset,
    ) -> Result<bool, AppError> {
        let state = self.load_reward_state(&identity.uid).await?;
        Ok(is_claim_eligible(state.last_claim_at, (self.clock)(), offset))
    }

    /// Claim the daily reward.
    ///
    /// Issues at most one store write. The returned state is computed from
    /// the values read at request time; the store's acknowledgment only
    /// confirms the write. On any error the local mirror is left untouched
    /// and the claim may be retried.
    pub async fn claim_daily_reward(
        &self,
        identity: &Identity,
        offset: FixedOffset,
    ) -> Result<RewardState, AppError> {
        let uid = identity.uid.as_str();

        let lock = self
            .claim_locks
            .entry(uid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        // Reject instead of queueing: a waiting claim would only find itself ineligible.
        let _guard = lock.try_lock_owned().map_err(|_| {
            tracing::debug!(uid, "Claim already in flight");
            AppError::ClaimInFlight
        })?;

        let now = (self.clock)();
        let current = self
            .store
            .get_profile(uid)
            .await?
            .map(|p| p.reward_state())
            .unwrap_or_default();

        if !is_claim_eligible(current.last_claim_at, now, offset) {
            self.reward_cache.insert(uid.to_string(), current);
            return Err(AppError::NotEligible);
        }

        let write = ClaimWrite {
            coins: DAILY_CLAIM_COINS,
            engagement_score: DAILY_CLAIM_SCORE,
            not_claimed_since: start_of_local_day(now, offset),
        };

        let confirmed = self.store.apply_claim(uid, &write).await.map_err(|e| {
            tracing::warn!(uid, error = %e, "Daily claim failed");
            e
        })?;

        let optimistic = current.after_claim(now);
        tracing::debug!(
            uid,
            coins = optimistic.coins,
            confirmed_coins = confirmed.coins,
            "Daily claim acknowledged"
        );
        self.reward_cache.insert(uid.to_string(), optimistic);

        tracing::info!(
            uid,
            coins = optimistic.coins,
            engagement_score = optimistic.engagement_score,
            "Daily reward claimed"
        );
        Ok(optimistic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_absent_last_claim_is_eligible() {
        let now = Utc.with_ymd_and_hms(2024, 4, 2, 8, 0, 0).unwrap();
        assert!(is_claim_eligible(None, now, utc()));
    }

    #[test]
    fn test_same_calendar_day_is_not_eligible() {
        let last = Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 1).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 4, 2, 23, 59, 59).unwrap();
        assert!(!is_claim_eligible(Some(last), now, utc()));
    }

    #[test]
    fn test_next_calendar_day_is_eligible_within_hours() {
        let last = Utc.with_ymd_and_hms(2024, 4, 2, 23, 59, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 4, 3, 0, 1, 0).unwrap();
        assert!(is_claim_eligible(Some(last), now, utc()));
    }

    #[test]
    fn test_any_later_day_is_eligible() {
        let last = Utc.with_ymd_and_hms(2023, 12, 31, 12, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert!(is_claim_eligible(Some(last), now, utc()));
    }

    #[test]
    fn test_eligibility_uses_viewer_zone() {
        // 2024-04-03 03:00 UTC is still April 2nd in UTC-07:00.
        let last = Utc.with_ymd_and_hms(2024, 4, 2, 18, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 4, 3, 3, 0, 0).unwrap();
        let pdt = FixedOffset::west_opt(7 * 3600).unwrap();

        assert!(is_claim_eligible(Some(last), now, utc()));
        assert!(!is_claim_eligible(Some(last), now, pdt));
    }
}
