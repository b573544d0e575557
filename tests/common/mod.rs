//! Shared helpers for the integration test suites.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::json;

use mendhub_session::{
    ManualClock, MemoryStore, SessionConfig, SessionGateway, TokenLifecycleManager,
};

/// Everything a test needs to drive a full session stack against a mock
/// server: the gateway, its lifecycle manager, and direct handles on the
/// in-memory store and the manual clock.
pub struct TestSession {
    pub gateway: SessionGateway,
    pub lifecycle: TokenLifecycleManager,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

/// Config pointed at the mock server, with timings shrunk so tests finish
/// quickly: 150 ms debounce window, 5 s request timeout, 1 s proactive
/// refresh period.
pub fn test_config(server_uri: &str) -> SessionConfig {
    SessionConfig {
        api_base: server_uri.to_string(),
        request_timeout_seconds: 5,
        expiry_buffer_seconds: 60,
        proactive_refresh_interval_seconds: 1,
        session_expired_debounce_ms: 150,
        keyring_service: "mendhub-test".to_string(),
    }
}

static TRACING: Once = Once::new();

/// Installs a test-writer tracing subscriber once per test binary.
/// Controlled with `RUST_LOG`, silent by default.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Builds a session stack over a [`MemoryStore`] and a [`ManualClock`]
/// frozen at `now`.
pub fn make_session(server_uri: &str, now: i64) -> TestSession {
    init_tracing();
    let config = test_config(server_uri);
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(now));
    let http = Arc::new(reqwest::Client::new());

    let lifecycle = TokenLifecycleManager::new(
        Arc::clone(&store) as Arc<dyn mendhub_session::CredentialStore>,
        Arc::clone(&http),
        Arc::clone(&clock) as Arc<dyn mendhub_session::Clock>,
        config.clone(),
    );
    let gateway = SessionGateway::new(lifecycle.clone(), http, config);

    TestSession {
        gateway,
        lifecycle,
        store,
        clock,
    }
}

/// Builds an unsigned JWT-shaped token whose payload carries the given
/// `exp` claim. The signature segment is garbage; nothing verifies it.
pub fn make_jwt(exp: i64) -> String {
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{},"sub":"user-1"}}"#, exp));
    format!("eyJhbGciOiJub25lIn0.{}.sig", payload)
}

/// Success envelope for the renewal endpoint.
pub fn refresh_success_body(access: &str, renewal: Option<&str>) -> serde_json::Value {
    match renewal {
        Some(renewal) => json!({
            "is_success": true,
            "data": { "access_token": access, "refresh_token": renewal }
        }),
        None => json!({
            "is_success": true,
            "data": { "access_token": access }
        }),
    }
}

/// Rejection envelope for the renewal endpoint (HTTP 200 but
/// `is_success: false`, the way the API reports a dead renewal token).
pub fn refresh_rejected_body(message: &str) -> serde_json::Value {
    json!({ "is_success": false, "message": message })
}
