// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and viewer calendar days.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, SecondsFormat, Utc};
use std::sync::Arc;

use crate::config::MAX_TZ_OFFSET_MINUTES;

/// Source of "now" shared by services and stores.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Clock backed by the host's system time.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Build a viewer offset from minutes east of UTC.
///
/// Returns `None` outside UTC-14:00..=UTC+14:00.
pub fn viewer_offset(minutes_east: i32) -> Option<FixedOffset> {
    if minutes_east.abs() > MAX_TZ_OFFSET_MINUTES {
        return None;
    }
    FixedOffset::east_opt(minutes_east * 60)
}

/// Calendar date of `instant` as seen by the viewer.
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// The UTC instant at which the viewer's calendar day containing `now` began.
pub fn start_of_local_day(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let midnight = local_date(now, offset).and_time(chrono::NaiveTime::MIN);
    // Fixed offsets have no gaps, so local midnight always maps to one instant.
    midnight.and_utc() - Duration::seconds(i64::from(offset.local_minus_utc()))
}

/// The UTC instant at which the viewer's next calendar day begins.
pub fn start_of_next_local_day(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    start_of_local_day(now, offset) + Duration::days(1)
}
