//! Error types for the MendHub session SDK
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.
//!
//! The error kinds fall into two propagation classes:
//!
//! - **Recovered locally**: [`SessionError::Storage`] and
//!   [`SessionError::Claim`] are logged at their origin and treated as a
//!   cache miss; they never bubble up to calling application code.
//! - **Surfaced to callers**: [`SessionError::Network`],
//!   [`SessionError::Timeout`], [`SessionError::Authorization`],
//!   [`SessionError::Api`] and [`SessionError::Renewal`] are normalized
//!   into a shape carrying an HTTP-status-like code (see
//!   [`SessionError::status`]) so UI code can show retry affordances.

use std::time::Duration;

use thiserror::Error;

/// Main error type for session SDK operations
///
/// This enum encompasses all possible errors that can occur during
/// credential loading, token renewal, gateway requests, and configuration
/// loading.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential store read/write failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Token claim missing or malformed
    #[error("Credential claim error: {0}")]
    Claim(String),

    /// Connectivity-level failure (DNS, TCP, TLS, malformed response)
    ///
    /// Never triggers the session-expired cascade.
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within its deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Authorization failure (401-equivalent) from an authenticated request
    #[error("Authorization error: HTTP {status}: {message}")]
    Authorization {
        /// The HTTP status code (401 for real responses, also 401 for the
        /// synthetic pre-flight short-circuit)
        status: u16,
        /// Additional message from the response body, when available
        message: String,
    },

    /// A non-2xx, non-401 response from the API
    #[error("API error: HTTP {status}: {message}")]
    Api {
        /// The HTTP status code returned by the server
        status: u16,
        /// Additional message from the response body, when available
        message: String,
    },

    /// A renewal call failed (network failure or the server rejected the
    /// renewal credential)
    ///
    /// Always accompanied by a full credential clear; equivalent to an
    /// explicit logout.
    #[error("Session renewal failed: {0}")]
    Renewal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl SessionError {
    /// Returns the HTTP-status-like code for normalized error handling.
    ///
    /// Authorization and API errors carry the real response status;
    /// renewal failures map to `401` because they are equivalent to an
    /// expired session; other kinds have no status.
    ///
    /// # Examples
    ///
    /// ```
    /// use mendhub_session::SessionError;
    ///
    /// let err = SessionError::Authorization {
    ///     status: 401,
    ///     message: "token rejected".to_string(),
    /// };
    /// assert_eq!(err.status(), Some(401));
    ///
    /// let err = SessionError::Network("connection refused".to_string());
    /// assert_eq!(err.status(), None);
    /// ```
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authorization { status, .. } | Self::Api { status, .. } => Some(*status),
            Self::Renewal(_) => Some(401),
            _ => None,
        }
    }

    /// Returns `true` for failures that must never trigger the
    /// session-expired cascade (timeouts and connectivity errors).
    pub fn is_network_failure(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

/// Result type alias for session SDK operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = SessionError::Config("missing api_base".to_string());
        assert_eq!(error.to_string(), "Configuration error: missing api_base");
    }

    #[test]
    fn test_storage_error_display() {
        let error = SessionError::Storage("keyring locked".to_string());
        assert_eq!(error.to_string(), "Storage error: keyring locked");
    }

    #[test]
    fn test_claim_error_display() {
        let error = SessionError::Claim("no exp claim".to_string());
        assert_eq!(error.to_string(), "Credential claim error: no exp claim");
    }

    #[test]
    fn test_network_error_display() {
        let error = SessionError::Network("connection reset".to_string());
        assert_eq!(error.to_string(), "Network error: connection reset");
    }

    #[test]
    fn test_timeout_error_display() {
        let error = SessionError::Timeout(Duration::from_secs(30));
        assert!(error.to_string().contains("30s"));
    }

    #[test]
    fn test_authorization_error_display() {
        let error = SessionError::Authorization {
            status: 401,
            message: "token expired".to_string(),
        };
        let s = error.to_string();
        assert!(s.contains("401"));
        assert!(s.contains("token expired"));
    }

    #[test]
    fn test_renewal_error_display() {
        let error = SessionError::Renewal("refresh token rejected".to_string());
        assert_eq!(
            error.to_string(),
            "Session renewal failed: refresh token rejected"
        );
    }

    #[test]
    fn test_status_for_authorization() {
        let error = SessionError::Authorization {
            status: 401,
            message: String::new(),
        };
        assert_eq!(error.status(), Some(401));
    }

    #[test]
    fn test_status_for_api_error() {
        let error = SessionError::Api {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(error.status(), Some(503));
    }

    #[test]
    fn test_status_for_renewal_maps_to_401() {
        let error = SessionError::Renewal("rejected".to_string());
        assert_eq!(error.status(), Some(401));
    }

    #[test]
    fn test_status_absent_for_network_kinds() {
        assert_eq!(SessionError::Network("x".to_string()).status(), None);
        assert_eq!(SessionError::Timeout(Duration::from_secs(1)).status(), None);
        assert_eq!(SessionError::Storage("x".to_string()).status(), None);
    }

    #[test]
    fn test_is_network_failure() {
        assert!(SessionError::Network("x".to_string()).is_network_failure());
        assert!(SessionError::Timeout(Duration::from_secs(1)).is_network_failure());
        assert!(!SessionError::Renewal("x".to_string()).is_network_failure());
        assert!(!SessionError::Authorization {
            status: 401,
            message: String::new()
        }
        .is_network_failure());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: SessionError = io_error.into();
        assert!(matches!(error, SessionError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{bad json}").unwrap_err();
        let error: SessionError = json_error.into();
        assert!(matches!(error, SessionError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("bad: : yaml").unwrap_err();
        let error: SessionError = yaml_error.into();
        assert!(matches!(error, SessionError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SessionError>();
    }
}
