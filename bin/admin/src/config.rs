//! Console configuration.
//!
//! Loaded via the `config` crate from environment variables prefixed with
//! `BACKOFFICE_`, using `__` to separate nested keys:
//!
//! ```text
//! BACKOFFICE_API__BASE_URL=https://api.example.com/api
//! BACKOFFICE_SESSION__VALIDATE_INTERVAL_SECONDS=60
//! BACKOFFICE_STORE_PATH=/var/lib/backoffice/session.json
//! ```

use backoffice_session::{ApiConfig, SessionSettings};
use serde::Deserialize;
use std::path::PathBuf;

/// Console configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct AdminConfig {
    /// Remote API settings.
    pub api: ApiConfig,

    /// Session manager settings.
    #[serde(default)]
    pub session: SessionSettings,

    /// File holding the persisted session.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".backoffice/session.json")
}

impl AdminConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(environment())
    }

    fn from_environment(source: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("BACKOFFICE")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoffice_access::Role;
    use std::time::Duration;

    fn load(vars: &[(&str, &str)]) -> Result<AdminConfig, config::ConfigError> {
        let vars = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AdminConfig::from_environment(environment().source(Some(vars)))
    }

    #[test]
    fn defaults_apply_when_only_base_url_is_set() {
        let config = load(&[("BACKOFFICE_API__BASE_URL", "http://localhost:3001/api")])
            .expect("config");

        assert_eq!(config.api.base_url, "http://localhost:3001/api");
        assert_eq!(config.store_path, PathBuf::from(".backoffice/session.json"));
        assert_eq!(config.session.validate_interval(), Duration::from_secs(300));
        assert_eq!(config.session.admin_area_role, Role::User);
    }

    #[test]
    fn nested_overrides_are_read() {
        let config = load(&[
            ("BACKOFFICE_API__BASE_URL", "https://api.example.com/api"),
            ("BACKOFFICE_SESSION__VALIDATE_INTERVAL_SECONDS", "60"),
            ("BACKOFFICE_SESSION__ADMIN_AREA_ROLE", "admin"),
            ("BACKOFFICE_STORE_PATH", "/tmp/session.json"),
        ])
        .expect("config");

        assert_eq!(config.session.validate_interval_seconds, 60);
        assert_eq!(config.session.admin_area_role, Role::Admin);
        assert_eq!(config.store_path, PathBuf::from("/tmp/session.json"));
    }

    #[test]
    fn missing_base_url_is_an_error() {
        assert!(load(&[("BACKOFFICE_STORE_PATH", "/tmp/x.json")]).is_err());
    }
}
