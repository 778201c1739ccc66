// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session and profile routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::SESSION_COOKIE;
use crate::models::user::MAX_DISPLAY_NAME_LEN;
use crate::models::{Identity, ProfilePatch, UserProfile};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Session routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/session", post(start_session).delete(end_session))
        .route("/api/me", get(get_me).patch(update_me))
}

/// Profile response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileResponse {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub is_privileged: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub coins: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub engagement_score: u64,
    pub last_claim_at: Option<String>,
    pub created_at: String,
}

impl From<UserProfile> for ProfileResponse {
    fn from(p: UserProfile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            display_name: p.display_name,
            photo_url: p.photo_url,
            is_privileged: p.is_privileged,
            coins: p.coins,
            engagement_score: p.engagement_score,
            last_claim_at: p.last_claim_at.map(format_utc_rfc3339),
            created_at: format_utc_rfc3339(p.created_at),
        }
    }
}

/// Identity fields that changed at the provider since the profile was stored.
///
/// The display name is user-editable, so it is only taken from the provider
/// when the profile has none.
fn provider_changes(identity: &Identity, profile: &UserProfile) -> ProfilePatch {
    ProfilePatch {
        email: (profile.email != identity.email).then(|| identity.email.clone()),
        display_name: (profile.display_name.is_none() && identity.display_name.is_some())
            .then(|| identity.display_name.clone()),
        photo_url: (profile.photo_url != identity.photo_url).then(|| identity.photo_url.clone()),
        is_privileged: (profile.is_privileged != identity.is_privileged)
            .then_some(identity.is_privileged),
    }
}

/// Start a session: create the profile on first sign-in, otherwise refresh
/// provider-owned fields.
async fn start_session(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ProfileResponse>> {
    let profile = match state.store.get_profile(&identity.uid).await? {
        Some(mut existing) => {
            let patch = provider_changes(&identity, &existing);
            if !patch.is_empty() {
                state.store.update_profile(&identity.uid, &patch).await?;
                patch.apply_to(&mut existing);
                tracing::debug!(uid = %identity.uid, "Profile refreshed from identity provider");
            }
            existing
        }
        None => {
            let profile = UserProfile::new(&identity, chrono::Utc::now());
            let stored = state.store.create_profile(&profile).await?;
            tracing::info!(uid = %identity.uid, "First sign-in, profile created");
            stored
        }
    };

    Ok(Json(profile.into()))
}

/// End the session: drop live list subscriptions and clear the cookie.
async fn end_session(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
) -> (CookieJar, StatusCode) {
    state.lists.close_session(&identity);
    tracing::info!(uid = %identity.uid, "Session ended");
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    )
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ProfileResponse>> {
    let profile = state
        .store
        .get_profile(&identity.uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", identity.uid)))?;

    Ok(Json(profile.into()))
}

#[derive(Deserialize, Validate)]
struct UpdateMeRequest {
    #[validate(length(max = 80))]
    display_name: Option<String>,
}

/// Edit the display name. An empty or blank name clears it.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<UpdateMeRequest>,
) -> Result<Json<ProfileResponse>> {
    body.validate().map_err(|_| {
        AppError::BadRequest(format!(
            "display_name must be at most {} characters",
            MAX_DISPLAY_NAME_LEN
        ))
    })?;

    let display_name = body
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let patch = ProfilePatch {
        display_name: Some(display_name),
        ..Default::default()
    };
    state.store.update_profile(&identity.uid, &patch).await?;

    get_me(State(state), Extension(identity)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_changes_keeps_edited_display_name() {
        let identity = Identity {
            uid: "u1".to_string(),
            email: Some("new@example.com".to_string()),
            display_name: Some("Provider Name".to_string()),
            photo_url: None,
            is_privileged: true,
            session_id: None,
        };
        let mut profile = UserProfile::new(&identity, chrono::Utc::now());
        profile.email = Some("old@example.com".to_string());
        profile.display_name = Some("Edited".to_string());
        profile.is_privileged = false;

        let patch = provider_changes(&identity, &profile);

        assert_eq!(patch.email, Some(Some("new@example.com".to_string())));
        assert_eq!(patch.display_name, None);
        assert_eq!(patch.photo_url, None);
        assert_eq!(patch.is_privileged, Some(true));
    }

    #[test]
    fn test_provider_changes_empty_when_in_sync() {
        let identity = Identity::from_uid("u1");
        let profile = UserProfile::new(&identity, chrono::Utc::now());
        assert!(provider_changes(&identity, &profile).is_empty());
    }
}
