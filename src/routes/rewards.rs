// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily reward routes.

use crate::error::Result;
use crate::middleware::ViewerTz;
use crate::models::{Identity, RewardState};
use crate::services::ClaimStatus;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Reward routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/rewards", get(get_rewards))
        .route("/api/rewards/claim", post(claim_reward))
}

/// Reward balance and claim availability.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RewardsResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub coins: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub engagement_score: u64,
    pub last_claim_at: Option<String>,
    pub can_claim: bool,
    pub claim_in_flight: bool,
    /// Start of the viewer's next day when `can_claim` is false
    pub next_claim_at: Option<String>,
}

impl RewardsResponse {
    fn from_state(
        state: RewardState,
        can_claim: bool,
        claim_in_flight: bool,
        next_claim_at: Option<String>,
    ) -> Self {
        Self {
            coins: state.coins,
            engagement_score: state.engagement_score,
            last_claim_at: state.last_claim_at.map(format_utc_rfc3339),
            can_claim,
            claim_in_flight,
            next_claim_at,
        }
    }
}

impl From<ClaimStatus> for RewardsResponse {
    fn from(status: ClaimStatus) -> Self {
        Self::from_state(
            status.state,
            status.can_claim,
            status.claim_in_flight,
            status.next_claim_at.map(format_utc_rfc3339),
        )
    }
}

async fn get_rewards(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ViewerTz(offset): ViewerTz,
) -> Result<Json<RewardsResponse>> {
    let status = state.engagement.reward_status(&identity, offset).await?;
    Ok(Json(status.into()))
}

/// Claim today's reward and return the new balance.
async fn claim_reward(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ViewerTz(offset): ViewerTz,
) -> Result<Json<RewardsResponse>> {
    let new_state = state
        .engagement
        .claim_daily_reward(&identity, offset)
        .await?;

    let next_claim_at = new_state
        .last_claim_at
        .map(|at| format_utc_rfc3339(crate::time_utils::start_of_next_local_day(at, offset)));

    Ok(Json(RewardsResponse::from_state(
        new_state,
        false,
        false,
        next_claim_at,
    )))
}
