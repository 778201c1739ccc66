// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Viewer time zone extractor.

use crate::error::AppError;
use crate::time_utils::viewer_offset;
use crate::AppState;
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::FixedOffset;
use std::sync::Arc;

/// Header carrying the viewer's UTC offset in minutes east of UTC (e.g. `-420`).
pub const TZ_OFFSET_HEADER: &str = "x-timezone-offset";

/// The viewer's UTC offset, from [`TZ_OFFSET_HEADER`] or the configured default.
#[derive(Debug, Clone, Copy)]
pub struct ViewerTz(pub FixedOffset);

impl FromRequestParts<Arc<AppState>> for ViewerTz {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let invalid = || {
            AppError::BadRequest(format!(
                "Invalid '{}' header: expected minutes east of UTC",
                TZ_OFFSET_HEADER
            ))
        };

        let minutes = match parts.headers.get(TZ_OFFSET_HEADER) {
            Some(value) => value
                .to_str()
                .map_err(|_| invalid())?
                .trim()
                .parse::<i32>()
                .map_err(|_| invalid())?,
            None => state.config.default_tz_offset_minutes,
        };

        viewer_offset(minutes).map(ViewerTz).ok_or_else(invalid)
    }
}
