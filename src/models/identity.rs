// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated principal as supplied by the session provider.

/// Identity of the signed-in user for the duration of one request.
///
/// Built by the auth middleware from a verified session token and passed
/// explicitly to every service operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable opaque uid
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    /// Admin flag, derived from the configured admin emails
    pub is_privileged: bool,
    /// Session the request was made under; sign-out only ends this session
    pub session_id: Option<String>,
}

impl Identity {
    /// Identity with only a uid, for tests and internal callers.
    pub fn from_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
            is_privileged: false,
            session_id: None,
        }
    }

    /// Same identity, bound to a specific session.
    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}
