//! # MendHub Session SDK
//!
//! Client-side session management for the MendHub marketplace apps:
//! credential caching with expiry evaluation, single-flight token renewal,
//! a proactive refresh timer, and a session-aware HTTP gateway with a
//! debounced, exactly-once forced-logout cascade.
//!
//! ## Features
//!
//! - **Credential lifecycle**: access and renewal credentials cached in
//!   memory, persisted in the OS keyring, expiry read from the embedded
//!   token claim with a safety buffer.
//! - **Single-flight renewal**: any number of concurrent callers share one
//!   renewal request and observe the same outcome.
//! - **Proactive refresh**: a background timer renews before an active
//!   request has to discover expiry.
//! - **Session-expired cascade**: authorization failures collapse into a
//!   single forced logout per debounce window, with a pre-flight
//!   short-circuit while the window is open.
//! - **Normalized errors**: every failure maps to a [`SessionError`] with
//!   an HTTP-status-like code; timeouts and connectivity failures never
//!   force a logout.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use mendhub_session::auth::clock::SystemClock;
//! use mendhub_session::auth::store::KeyringStore;
//! use mendhub_session::{SessionConfig, SessionGateway, TokenLifecycleManager};
//!
//! # async fn example() -> mendhub_session::Result<()> {
//! let config = SessionConfig::load("session.yaml")?;
//! config.validate()?;
//!
//! let http = Arc::new(reqwest::Client::new());
//! let lifecycle = TokenLifecycleManager::new(
//!     Arc::new(KeyringStore::new(&config.keyring_service)),
//!     Arc::clone(&http),
//!     Arc::new(SystemClock),
//!     config.clone(),
//! );
//! let gateway = SessionGateway::new(lifecycle.clone(), http, config);
//!
//! gateway.set_on_session_expired(|| {
//!     // Navigate to the login screen.
//! });
//! lifecycle.start_proactive_refresh();
//!
//! let profile = gateway.get("/profile").await?;
//! println!("profile: {}", profile.body);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;

pub use auth::claims::{decode_claims, decode_expiry, UntrustedClaims};
pub use auth::clock::{Clock, ManualClock, SystemClock};
pub use auth::lifecycle::{Credential, TokenLifecycleManager};
pub use auth::store::{CredentialStore, KeyringStore, MemoryStore};
pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use gateway::{ApiResponse, RequestOptions, SessionExpiredCallback, SessionGateway};
