//! Session Lifecycle Walkthrough
//!
//! This example demonstrates how to wire up the session stack:
//! 1. Load and validate the configuration
//! 2. Build a lifecycle manager over the OS keyring
//! 3. Register the session-expired callback
//! 4. Make authenticated requests through the gateway
//!
//! # Running
//!
//! Set the API base (and optionally a login token pair):
//! ```bash
//! export MENDHUB_API_BASE="https://api.mendhub.app"
//! export MENDHUB_ACCESS_TOKEN="eyJ..."
//! export MENDHUB_REFRESH_TOKEN="eyJ..."
//! ```
//!
//! Then run with:
//! ```bash
//! cargo run --example session_walkthrough
//! ```

use std::sync::Arc;

use mendhub_session::auth::clock::SystemClock;
use mendhub_session::auth::store::KeyringStore;
use mendhub_session::{RequestOptions, SessionConfig, SessionGateway, TokenLifecycleManager};

#[tokio::main]
async fn main() -> mendhub_session::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = SessionConfig {
        api_base: std::env::var("MENDHUB_API_BASE")
            .unwrap_or_else(|_| "https://api.mendhub.app".to_string()),
        ..Default::default()
    };
    config.validate()?;

    let http = Arc::new(reqwest::Client::new());
    let lifecycle = TokenLifecycleManager::new(
        Arc::new(KeyringStore::new(&config.keyring_service)),
        Arc::clone(&http),
        Arc::new(SystemClock),
        config.clone(),
    );
    let gateway = SessionGateway::new(lifecycle.clone(), http, config);

    gateway.set_on_session_expired(|| {
        // A real app navigates to the login screen here.
        println!("session expired: please log in again");
    });

    // Seed credentials from the environment if provided (a real app gets
    // these from its login endpoint).
    if let (Ok(access), Ok(renewal)) = (
        std::env::var("MENDHUB_ACCESS_TOKEN"),
        std::env::var("MENDHUB_REFRESH_TOKEN"),
    ) {
        lifecycle.store_login_credentials(&access, &renewal).await?;
    }

    // Keep the access credential fresh in the background.
    lifecycle.start_proactive_refresh();

    // Probe the saved session without forcing a logout on a stale token.
    match gateway
        .request(
            reqwest::Method::GET,
            "/profile",
            None,
            &RequestOptions::suppress_auto_logout(),
        )
        .await
    {
        Ok(response) => println!("logged in: {}", response.body),
        Err(e) => println!("no live session: {e}"),
    }

    lifecycle.stop_proactive_refresh();
    Ok(())
}
