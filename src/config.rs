// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development.

use std::env;

/// Maximum magnitude of a viewer UTC offset, in minutes (UTC-14:00..UTC+14:00).
pub const MAX_TZ_OFFSET_MINUTES: i32 = 14 * 60;

/// Which profile store implementation to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid("STORE_BACKEND")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// HS256 key used to verify session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Lower-cased emails granted the privileged (admin) flag
    pub admin_emails: Vec<String>,
    /// Profile store implementation
    pub store_backend: StoreBackend,
    /// Viewer offset used when a request carries no `X-Timezone-Offset`
    pub default_tz_offset_minutes: i32,
    /// Interval for re-reading live lists to pick up writes from other instances
    pub list_refresh_secs: u64,
}

impl Config {
    /// Config for tests: in-memory store, UTC viewers, fixed signing key.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            admin_emails: vec!["admin@example.com".to_string()],
            store_backend: StoreBackend::Memory,
            default_tz_offset_minutes: 0,
            list_refresh_secs: 30,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let default_tz_offset_minutes: i32 = env::var("DEFAULT_TZ_OFFSET_MINUTES")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("DEFAULT_TZ_OFFSET_MINUTES"))?;
        if default_tz_offset_minutes.abs() > MAX_TZ_OFFSET_MINUTES {
            return Err(ConfigError::Invalid("DEFAULT_TZ_OFFSET_MINUTES"));
        }

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            admin_emails: parse_admin_emails(&env::var("ADMIN_EMAILS").unwrap_or_default()),
            store_backend: env::var("STORE_BACKEND")
                .unwrap_or_else(|_| "firestore".to_string())
                .parse()?,
            default_tz_offset_minutes,
            list_refresh_secs: env::var("LIST_REFRESH_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30)
                .max(1),
        })
    }

    /// Whether an email belongs to a privileged identity.
    pub fn is_admin_email(&self, email: Option<&str>) -> bool {
        email
            .map(|e| e.trim().to_ascii_lowercase())
            .is_some_and(|e| self.admin_emails.iter().any(|a| *a == e))
    }
}

fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("ADMIN_EMAILS", " Boss@Example.com, ,ops@example.com");
        env::set_var("STORE_BACKEND", "memory");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.port, 8080);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(
            config.admin_emails,
            vec!["boss@example.com".to_string(), "ops@example.com".to_string()]
        );
        assert!(config.is_admin_email(Some("BOSS@example.com ")));
        assert!(!config.is_admin_email(Some("guest@example.com")));
        assert!(!config.is_admin_email(None));
    }

    #[test]
    fn test_store_backend_rejects_unknown() {
        assert!("sqlite".parse::<StoreBackend>().is_err());
        assert_eq!(
            "Firestore".parse::<StoreBackend>().unwrap(),
            StoreBackend::Firestore
        );
    }
}
