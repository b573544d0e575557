//! Session-aware HTTP gateway
//!
//! Every API call the application makes flows through [`SessionGateway`].
//! The gateway attaches the access credential (renewing through the
//! lifecycle manager when needed), enforces per-request timeouts, and
//! normalizes failures into [`SessionError`] values carrying an
//! HTTP-status-like code.
//!
//! Its second responsibility is the **session-expired cascade**: when an
//! authenticated request comes back 401, or a credential renewal fails,
//! the gateway clears all credential state and invokes the registered
//! session-expired callback -- exactly once per debounce window, no matter
//! how many requests fail concurrently. While the window is open,
//! authenticated requests fail fast with a synthetic 401 instead of
//! hitting the network with a credential known to be dead.
//!
//! Failure classes that must never force a logout -- timeouts and
//! connectivity errors -- are kept strictly separate from authorization
//! failures; see [`SessionError::is_network_failure`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use tokio::task::JoinHandle;

use crate::auth::lifecycle::TokenLifecycleManager;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// Callback invoked when the session is declared expired.
///
/// Runs on a tokio worker; keep it cheap (signal the UI layer, do not do
/// I/O inline).
pub type SessionExpiredCallback = Arc<dyn Fn() + Send + Sync>;

// ---------------------------------------------------------------------------
// Request options / response
// ---------------------------------------------------------------------------

/// Per-request knobs for [`SessionGateway::request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Attach the access credential (renewing if needed). When the caller
    /// is unauthenticated the request still goes out without a credential
    /// so the server can reject it itself.
    pub require_auth: bool,

    /// Surface a 401 to the caller without triggering the forced-logout
    /// cascade. Used by flows that probe authorization state, e.g. "is my
    /// saved session still alive" on app start.
    ///
    /// A *renewal* failure still cascades regardless of this flag: at that
    /// point the session is unrecoverable, not merely rejected once.
    pub skip_auto_logout_on_401: bool,

    /// Overrides the configured default timeout for this request.
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            require_auth: true,
            skip_auto_logout_on_401: false,
            timeout: None,
        }
    }
}

impl RequestOptions {
    /// Options for an endpoint that needs no credential.
    pub fn unauthenticated() -> Self {
        Self {
            require_auth: false,
            ..Default::default()
        }
    }

    /// Options for an authenticated probe that must not force a logout.
    pub fn suppress_auto_logout() -> Self {
        Self {
            skip_auto_logout_on_401: true,
            ..Default::default()
        }
    }
}

/// Normalized successful response: the status code plus the body parsed
/// as JSON (`Null` when the body is empty or not JSON).
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code (always 2xx here; non-2xx becomes an error).
    pub status: u16,

    /// Response body as a JSON value.
    pub body: serde_json::Value,
}

impl ApiResponse {
    /// Deserializes the body into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Serialization`] when the body does not
    /// match the target type.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let value = serde_json::from_value(self.body.clone()).map_err(SessionError::from)?;
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// SessionGateway
// ---------------------------------------------------------------------------

struct GatewayInner {
    http: Arc<reqwest::Client>,
    lifecycle: TokenLifecycleManager,
    config: SessionConfig,
    session_expired: AtomicBool,
    on_session_expired: std::sync::Mutex<Option<SessionExpiredCallback>>,
}

/// The session-aware request path plus the session-expired cascade.
///
/// Cheap to clone; clones share the same debounce state and callback.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use mendhub_session::auth::clock::SystemClock;
/// use mendhub_session::auth::store::KeyringStore;
/// use mendhub_session::{SessionConfig, SessionGateway, TokenLifecycleManager};
///
/// # async fn example() -> mendhub_session::Result<()> {
/// let config = SessionConfig::default();
/// let http = Arc::new(reqwest::Client::new());
/// let lifecycle = TokenLifecycleManager::new(
///     Arc::new(KeyringStore::new(&config.keyring_service)),
///     Arc::clone(&http),
///     Arc::new(SystemClock),
///     config.clone(),
/// );
/// let gateway = SessionGateway::new(lifecycle, http, config);
///
/// gateway.set_on_session_expired(|| {
///     // Tell the UI layer to navigate to the login screen.
/// });
///
/// let bookings = gateway.get("/bookings").await?;
/// println!("status {}", bookings.status);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionGateway {
    inner: Arc<GatewayInner>,
}

impl SessionGateway {
    /// Creates a gateway over an existing lifecycle manager.
    ///
    /// The HTTP client is shared with the lifecycle manager so connection
    /// pools are reused; the renewal endpoint itself never routes through
    /// the gateway.
    pub fn new(
        lifecycle: TokenLifecycleManager,
        http: Arc<reqwest::Client>,
        config: SessionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                http,
                lifecycle,
                config,
                session_expired: AtomicBool::new(false),
                on_session_expired: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Returns the lifecycle manager backing this gateway.
    pub fn lifecycle(&self) -> &TokenLifecycleManager {
        &self.inner.lifecycle
    }

    /// Registers the session-expired callback, replacing any previous one.
    ///
    /// One callback slot exists; it is invoked at most once per debounce
    /// window.
    pub fn set_on_session_expired<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut guard = self
            .inner
            .on_session_expired
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(Arc::new(callback));
    }

    /// Returns `true` while a session-expired debounce window is open.
    pub fn session_expired_pending(&self) -> bool {
        self.inner.session_expired.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Convenience surface
    // -----------------------------------------------------------------------

    /// `GET path` with default options.
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::GET, path, None, &RequestOptions::default())
            .await
    }

    /// `POST path` with a JSON body and default options.
    pub async fn post(&self, path: &str, body: serde_json::Value) -> Result<ApiResponse> {
        self.request(Method::POST, path, Some(body), &RequestOptions::default())
            .await
    }

    /// `PUT path` with a JSON body and default options.
    pub async fn put(&self, path: &str, body: serde_json::Value) -> Result<ApiResponse> {
        self.request(Method::PUT, path, Some(body), &RequestOptions::default())
            .await
    }

    /// `PATCH path` with a JSON body and default options.
    pub async fn patch(&self, path: &str, body: serde_json::Value) -> Result<ApiResponse> {
        self.request(Method::PATCH, path, Some(body), &RequestOptions::default())
            .await
    }

    /// `DELETE path` with default options.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::DELETE, path, None, &RequestOptions::default())
            .await
    }

    // -----------------------------------------------------------------------
    // Core request path
    // -----------------------------------------------------------------------

    /// Performs one API request with full control over options.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Authorization`] for 401 responses and for the
    ///   synthetic pre-flight rejection while a session-expired window is
    ///   open.
    /// - [`SessionError::Renewal`] when the credential could not be
    ///   renewed (the cascade has already been triggered).
    /// - [`SessionError::Timeout`] / [`SessionError::Network`] for
    ///   deadline and connectivity failures; these never cascade.
    /// - [`SessionError::Api`] for any other non-2xx response.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        options: &RequestOptions,
    ) -> Result<ApiResponse> {
        // Fail fast while a forced logout is in progress: the credential is
        // known dead, and hitting the network would just produce more 401s
        // racing the cascade.
        if options.require_auth && self.session_expired_pending() {
            tracing::debug!(%method, path, "rejecting request during session-expired window");
            return Err(SessionError::Authorization {
                status: 401,
                message: "session expired".to_string(),
            }
            .into());
        }

        let credential = if options.require_auth {
            match self.inner.lifecycle.get_valid_credential().await {
                Ok(credential) => credential,
                Err(e) => {
                    // A failed renewal is unrecoverable; the suppression
                    // flag only covers plain 401 responses.
                    if e.downcast_ref::<SessionError>()
                        .is_some_and(|err| matches!(err, SessionError::Renewal(_)))
                    {
                        self.spawn_session_expired_cascade();
                    }
                    return Err(e);
                }
            }
        } else {
            None
        };

        let url = self.inner.config.endpoint(path)?;
        let timeout = options
            .timeout
            .unwrap_or_else(|| self.inner.config.request_timeout());

        let mut builder = self
            .inner
            .http
            .request(method.clone(), url)
            .timeout(timeout);
        if let Some(credential) = &credential {
            builder = builder.bearer_auth(&credential.raw);
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        tracing::debug!(%method, path, authenticated = credential.is_some(), "sending request");

        // Race the whole send against the deadline as well: the reqwest
        // timeout covers the connection, this one covers the task.
        let response = match tokio::time::timeout(timeout, builder.send()).await {
            Err(_) => return Err(SessionError::Timeout(timeout).into()),
            Ok(Err(e)) if e.is_timeout() => return Err(SessionError::Timeout(timeout).into()),
            Ok(Err(e)) => return Err(SessionError::Network(e.to_string()).into()),
            Ok(Ok(response)) => response,
        };

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;
        let json: serde_json::Value = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);

        if (200..300).contains(&status) {
            return Ok(ApiResponse { status, body: json });
        }

        let message = extract_message(&json, &text);

        if status == 401 {
            if options.require_auth && !options.skip_auto_logout_on_401 {
                self.spawn_session_expired_cascade();
            } else {
                tracing::debug!(path, "authorization failure surfaced without cascade");
            }
            return Err(SessionError::Authorization { status, message }.into());
        }

        Err(SessionError::Api { status, message }.into())
    }

    // -----------------------------------------------------------------------
    // Session-expired cascade
    // -----------------------------------------------------------------------

    /// Starts the debounced forced-logout cascade.
    ///
    /// Returns `None` when a window is already open (the cascade for this
    /// window has run or is running); `Some(handle)` when this call won
    /// the debounce and spawned the cascade task.
    fn spawn_session_expired_cascade(&self) -> Option<JoinHandle<()>> {
        if self
            .inner
            .session_expired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("session-expired cascade already pending");
            return None;
        }

        let inner = Arc::clone(&self.inner);
        Some(tokio::spawn(async move {
            // The flag clear runs in its own task so the window always
            // closes, even if clearing credentials or the callback stalls.
            let window = inner.config.session_expired_debounce();
            let flag_inner = Arc::clone(&inner);
            tokio::spawn(async move {
                tokio::time::sleep(window).await;
                flag_inner.session_expired.store(false, Ordering::SeqCst);
                tracing::debug!("session-expired window closed");
            });

            tracing::info!("session expired; clearing credentials");
            if let Err(e) = inner.lifecycle.clear_credentials().await {
                tracing::warn!("failed to clear credentials during cascade: {e}");
            }

            let callback = {
                let guard = inner
                    .on_session_expired
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                guard.clone()
            };
            match callback {
                Some(callback) => callback(),
                None => tracing::debug!("no session-expired callback registered"),
            }
        }))
    }
}

/// Pulls a human-readable message out of an error response.
fn extract_message(json: &serde_json::Value, raw: &str) -> String {
    json.get("message")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| raw.trim().to_string())
}

// ---------------------------------------------------------------------------
// Tests  (network paths are covered against a mock server in tests/)
// ---------------------------------------------------------------------------
