//! Configuration for the API client and the session manager.
//!
//! Fields with defaults can be omitted when loading from environment variables.

use backoffice_access::Role;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the back-office API (e.g., "https://api.example.com/api").
    pub base_url: String,
}

impl ApiConfig {
    /// Creates an API configuration for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Joins `path` onto the base URL.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Session manager behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Interval between background validations of the access token, in seconds.
    #[serde(default = "default_validate_interval_seconds")]
    pub validate_interval_seconds: u64,

    /// Minimum role allowed to log into the admin area.
    #[serde(default = "default_admin_area_role")]
    pub admin_area_role: Role,
}

fn default_validate_interval_seconds() -> u64 {
    300
}

fn default_admin_area_role() -> Role {
    Role::User
}

impl SessionSettings {
    /// Returns the validation interval.
    ///
    /// Zero is clamped to one second so the timer never spins.
    #[must_use]
    pub fn validate_interval(&self) -> Duration {
        Duration::from_secs(self.validate_interval_seconds.max(1))
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            validate_interval_seconds: default_validate_interval_seconds(),
            admin_area_role: default_admin_area_role(),
        }
    }
}
