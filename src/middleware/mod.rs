// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware and request extractors (authentication, security headers,
//! viewer time zone).

pub mod auth;
pub mod security;
pub mod timezone;

pub use auth::require_auth;
pub use security::add_security_headers;
pub use timezone::ViewerTz;
