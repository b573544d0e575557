//! Configuration management for the session SDK
//!
//! This module handles loading, parsing, and validating the session
//! configuration from YAML files, with serde defaults for every tunable
//! so a minimal config only needs the API base URL.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Session SDK configuration
///
/// Holds the API endpoint plus the timing parameters that govern the token
/// lifecycle: the expiry safety buffer, the proactive refresh period, the
/// session-expired debounce window, and the default request timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base URL of the MendHub API (e.g. `https://api.mendhub.app`)
    pub api_base: String,

    /// Default per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Seconds before the real expiry at which an access credential is
    /// proactively treated as expired
    ///
    /// This converts "token still technically valid" into "renew now" so
    /// renewal completes before the server starts rejecting the credential.
    #[serde(default = "default_expiry_buffer")]
    pub expiry_buffer_seconds: i64,

    /// Period of the proactive refresh timer in seconds
    #[serde(default = "default_proactive_interval")]
    pub proactive_refresh_interval_seconds: u64,

    /// Grace window of the session-expired debounce in milliseconds
    ///
    /// Concurrent authorization failures within one window collapse into a
    /// single forced-logout cascade.
    #[serde(default = "default_debounce_window")]
    pub session_expired_debounce_ms: u64,

    /// Service name under which credentials are stored in the OS keyring
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_expiry_buffer() -> i64 {
    60
}

fn default_proactive_interval() -> u64 {
    300
}

fn default_debounce_window() -> u64 {
    2000
}

fn default_keyring_service() -> String {
    "mendhub".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.mendhub.app".to_string(),
            request_timeout_seconds: default_request_timeout(),
            expiry_buffer_seconds: default_expiry_buffer(),
            proactive_refresh_interval_seconds: default_proactive_interval(),
            session_expired_debounce_ms: default_debounce_window(),
            keyring_service: default_keyring_service(),
        }
    }
}

impl SessionConfig {
    /// Loads configuration from a YAML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] if the file cannot be read or
    /// [`SessionError::Yaml`] if the contents are not valid YAML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mendhub_session::SessionConfig;
    ///
    /// let config = SessionConfig::load("session.yaml").unwrap();
    /// config.validate().unwrap();
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(SessionError::Io)?;
        let config: Self = serde_yaml::from_str(&contents).map_err(SessionError::Yaml)?;
        Ok(config)
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] when the API base is empty or not a
    /// valid absolute URL, or when a timing parameter is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.api_base.trim().is_empty() {
            return Err(SessionError::Config("api_base must not be empty".to_string()).into());
        }
        url::Url::parse(&self.api_base)
            .map_err(|e| SessionError::Config(format!("api_base is not a valid URL: {}", e)))?;
        if self.request_timeout_seconds == 0 {
            return Err(
                SessionError::Config("request_timeout_seconds must be > 0".to_string()).into(),
            );
        }
        if self.expiry_buffer_seconds < 0 {
            return Err(
                SessionError::Config("expiry_buffer_seconds must be >= 0".to_string()).into(),
            );
        }
        if self.proactive_refresh_interval_seconds == 0 {
            return Err(SessionError::Config(
                "proactive_refresh_interval_seconds must be > 0".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Builds the absolute URL for an API path
    ///
    /// Joins `path` onto `api_base`, normalizing slashes on both sides.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the joined string is not a valid
    /// URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use mendhub_session::SessionConfig;
    ///
    /// let config = SessionConfig {
    ///     api_base: "https://api.mendhub.app/".to_string(),
    ///     ..Default::default()
    /// };
    /// let url = config.endpoint("/auth/refresh-token").unwrap();
    /// assert_eq!(url.as_str(), "https://api.mendhub.app/auth/refresh-token");
    /// ```
    pub fn endpoint(&self, path: &str) -> Result<url::Url> {
        let joined = format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let url = url::Url::parse(&joined)
            .map_err(|e| SessionError::Config(format!("invalid endpoint '{}': {}", joined, e)))?;
        Ok(url)
    }

    /// Default per-request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Proactive refresh period as a [`Duration`]
    pub fn proactive_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.proactive_refresh_interval_seconds)
    }

    /// Session-expired debounce window as a [`Duration`]
    pub fn session_expired_debounce(&self) -> Duration {
        Duration::from_millis(self.session_expired_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Defaults
    // -----------------------------------------------------------------------

    #[test]
    fn test_default_values() {
        let config = SessionConfig::default();
        assert_eq!(config.request_timeout_seconds, 30);
        assert_eq!(config.expiry_buffer_seconds, 60);
        assert_eq!(config.proactive_refresh_interval_seconds, 300);
        assert_eq!(config.session_expired_debounce_ms, 2000);
        assert_eq!(config.keyring_service, "mendhub");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config: SessionConfig =
            serde_yaml::from_str("api_base: https://api.example.com").expect("parse");
        assert_eq!(config.api_base, "https://api.example.com");
        assert_eq!(config.expiry_buffer_seconds, 60);
        assert_eq!(config.session_expired_debounce_ms, 2000);
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let yaml = r#"
api_base: https://api.example.com
request_timeout_seconds: 10
expiry_buffer_seconds: 120
proactive_refresh_interval_seconds: 60
session_expired_debounce_ms: 500
keyring_service: example
"#;
        let config: SessionConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.request_timeout_seconds, 10);
        assert_eq!(config.expiry_buffer_seconds, 120);
        assert_eq!(config.proactive_refresh_interval_seconds, 60);
        assert_eq!(config.session_expired_debounce_ms, 500);
        assert_eq!(config.keyring_service, "example");
    }

    // -----------------------------------------------------------------------
    // load()
    // -----------------------------------------------------------------------

    #[test]
    fn test_load_from_yaml_file() {
        use std::io::Write as _;

        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "api_base: https://api.example.com").expect("write");
        writeln!(file, "expiry_buffer_seconds: 90").expect("write");

        let config = SessionConfig::load(file.path()).expect("load");
        assert_eq!(config.api_base, "https://api.example.com");
        assert_eq!(config.expiry_buffer_seconds, 90);
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(SessionConfig::load("/nonexistent/session.yaml").is_err());
    }

    #[test]
    fn test_load_invalid_yaml_errors() {
        use std::io::Write as _;

        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "api_base: [unclosed").expect("write");
        assert!(SessionConfig::load(file.path()).is_err());
    }

    // -----------------------------------------------------------------------
    // validate()
    // -----------------------------------------------------------------------

    #[test]
    fn test_validate_rejects_empty_api_base() {
        let config = SessionConfig {
            api_base: "".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_api_base() {
        let config = SessionConfig {
            api_base: "not-a-url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = SessionConfig {
            request_timeout_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_buffer() {
        let config = SessionConfig {
            expiry_buffer_seconds: -1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_refresh_interval() {
        let config = SessionConfig {
            proactive_refresh_interval_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    // -----------------------------------------------------------------------
    // endpoint()
    // -----------------------------------------------------------------------

    #[test]
    fn test_endpoint_joins_with_leading_slash() {
        let config = SessionConfig {
            api_base: "https://api.example.com".to_string(),
            ..Default::default()
        };
        let url = config.endpoint("/bookings/42").expect("endpoint");
        assert_eq!(url.as_str(), "https://api.example.com/bookings/42");
    }

    #[test]
    fn test_endpoint_joins_without_leading_slash() {
        let config = SessionConfig {
            api_base: "https://api.example.com/".to_string(),
            ..Default::default()
        };
        let url = config.endpoint("bookings/42").expect("endpoint");
        assert_eq!(url.as_str(), "https://api.example.com/bookings/42");
    }

    #[test]
    fn test_endpoint_preserves_base_path() {
        let config = SessionConfig {
            api_base: "https://example.com/api/v2".to_string(),
            ..Default::default()
        };
        let url = config.endpoint("/wallet").expect("endpoint");
        assert_eq!(url.as_str(), "https://example.com/api/v2/wallet");
    }

    // -----------------------------------------------------------------------
    // Duration helpers
    // -----------------------------------------------------------------------

    #[test]
    fn test_duration_helpers() {
        let config = SessionConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.proactive_refresh_interval(), Duration::from_secs(300));
        assert_eq!(config.session_expired_debounce(), Duration::from_millis(2000));
    }
}
