//! Token lifecycle management
//!
//! This module owns the in-memory credential cache, expiry evaluation with
//! a safety buffer, single-flight renewal, and the proactive refresh timer.
//!
//! [`TokenLifecycleManager`] is the sole entry point for all credential
//! operations. Callers interact with it through a small surface:
//!
//! - [`TokenLifecycleManager::get_valid_credential`] -- returns a usable
//!   access credential, renewing when within the expiry buffer.
//! - [`TokenLifecycleManager::store_login_credentials`] -- persists the
//!   token pair issued at login and primes the cache.
//! - [`TokenLifecycleManager::clear_credentials`] -- idempotent teardown
//!   used by logout, renewal failure, and the session-expired cascade.
//! - [`TokenLifecycleManager::start_proactive_refresh`] /
//!   [`TokenLifecycleManager::stop_proactive_refresh`] -- a recurring
//!   timer that renews before an active request has to discover expiry.
//!
//! # Single-flight renewal
//!
//! Any number of concurrent callers may discover an expiring credential at
//! the same time; exactly one renewal request reaches the network. The
//! in-flight renewal is held as a [`futures::future::Shared`] so every
//! waiter observes the same outcome. The in-flight flag and the shared
//! handle are always set and cleared together, and both are cleared
//! *before* the outcome resolves, so a caller arriving between resolution
//! and cleanup cannot observe a half-finished renewal and start a
//! duplicate.
//!
//! # Construction
//!
//! The manager is an explicit instance -- no module-level singleton. Tests
//! construct independent managers with an in-memory store and a manual
//! clock.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::future::{FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::auth::claims::decode_expiry;
use crate::auth::clock::Clock;
use crate::auth::store::{
    CredentialStore, ACCESS_CREDENTIAL_KEY, RENEWAL_CREDENTIAL_KEY, SESSION_KEYS,
};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// Manufactured lifetime for renewal credentials that carry no readable
/// expiry claim: ten years, i.e. "assume valid until a renewal call
/// actively fails".
const FAR_FUTURE_SECS: i64 = 10 * 365 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// A cached credential: the raw token plus its expiry in Unix seconds.
///
/// Two instances exist concurrently in a live session: the short-lived
/// access credential attached to every authenticated request, and the
/// longer-lived renewal credential used only to mint new access
/// credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// The raw token string as sent to the server.
    pub raw: String,

    /// Expiry in seconds since the Unix epoch.
    ///
    /// Derived from the embedded claim when parseable; a manufactured
    /// far-future value otherwise.
    pub expires_at: i64,
}

impl Credential {
    /// Returns `true` when the credential expires within `buffer` seconds
    /// of `now` (or has already expired).
    ///
    /// # Examples
    ///
    /// ```
    /// use mendhub_session::Credential;
    ///
    /// let credential = Credential {
    ///     raw: "tok".to_string(),
    ///     expires_at: 1_000,
    /// };
    /// assert!(!credential.expires_within(939, 60));
    /// assert!(credential.expires_within(940, 60));
    /// ```
    pub fn expires_within(&self, now: i64, buffer: i64) -> bool {
        self.expires_at - now <= buffer
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// Outcome of a renewal shared between all concurrent waiters.
///
/// The error side is a plain message string because [`Shared`] requires a
/// `Clone` output; the public API re-wraps it as [`SessionError::Renewal`].
type RenewalOutcome = std::result::Result<Credential, String>;

type SharedRenewal = Shared<Pin<Box<dyn Future<Output = RenewalOutcome> + Send>>>;

/// Mutable lifecycle state, guarded by one async mutex.
///
/// Invariant: `renewal_in_flight` and `inflight` are set and cleared
/// together, never one without the other.
#[derive(Default)]
struct LifecycleState {
    access: Option<Credential>,
    renewal: Option<Credential>,
    renewal_in_flight: bool,
    inflight: Option<SharedRenewal>,
}

/// Handle to the running proactive refresh timer.
struct RefreshTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    store: Arc<dyn CredentialStore>,
    http: Arc<reqwest::Client>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    state: tokio::sync::Mutex<LifecycleState>,
    refresh_task: std::sync::Mutex<Option<RefreshTask>>,
}

// ---------------------------------------------------------------------------
// Renewal wire format
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshEnvelope {
    is_success: bool,
    #[serde(default)]
    data: Option<RefreshData>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct RefreshData {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

// ---------------------------------------------------------------------------
// TokenLifecycleManager
// ---------------------------------------------------------------------------

/// Owner of the cached credential state and the renewal machinery.
///
/// Cheap to clone; clones share the same state.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use mendhub_session::auth::clock::SystemClock;
/// use mendhub_session::auth::store::MemoryStore;
/// use mendhub_session::{SessionConfig, TokenLifecycleManager};
///
/// # async fn example() -> mendhub_session::Result<()> {
/// let manager = TokenLifecycleManager::new(
///     Arc::new(MemoryStore::new()),
///     Arc::new(reqwest::Client::new()),
///     Arc::new(SystemClock),
///     SessionConfig::default(),
/// );
///
/// // Nothing stored yet: the caller is simply unauthenticated.
/// assert!(manager.get_valid_credential().await?.is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TokenLifecycleManager {
    inner: Arc<Inner>,
}

impl TokenLifecycleManager {
    /// Creates a manager over the given store, HTTP client, and clock.
    ///
    /// The HTTP client is used for the renewal endpoint only; it
    /// deliberately bypasses the gateway so a renewal can never recurse
    /// into the gateway's 401 handling.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        http: Arc<reqwest::Client>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                http,
                clock,
                config,
                state: tokio::sync::Mutex::new(LifecycleState::default()),
                refresh_task: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Reads the access credential from the store and repopulates the
    /// cache slot unconditionally (last read wins).
    ///
    /// Returns `None` -- and leaves the slot empty -- when nothing is
    /// stored, when the store read fails (logged, treated as absent), or
    /// when the token carries no readable expiry claim.
    pub async fn load_access_credential(&self) -> Result<Option<Credential>> {
        Ok(self.inner.load_access().await)
    }

    /// Reads the renewal credential from the store and repopulates the
    /// cache slot unconditionally.
    ///
    /// Unlike the access credential, a renewal credential with no readable
    /// expiry claim is still usable: some identity providers issue opaque
    /// renewal tokens. Those get a manufactured far-future expiry, which
    /// degrades to "assume valid until a renewal call actively fails".
    pub async fn load_renewal_credential(&self) -> Result<Option<Credential>> {
        Ok(self.inner.load_renewal().await)
    }

    /// Returns `true` when no access credential is cached or the cached
    /// one expires within the configured buffer of `now`.
    ///
    /// The buffer converts "token still technically valid" into
    /// "proactively treat as expired" so renewal finishes before the
    /// server starts rejecting the credential.
    pub async fn is_access_expired(&self, now: i64) -> bool {
        let state = self.inner.state.lock().await;
        state
            .access
            .as_ref()
            .map_or(true, |c| c.expires_within(now, self.inner.config.expiry_buffer_seconds))
    }

    /// Returns a usable access credential, renewing if necessary.
    ///
    /// Resolution order:
    ///
    /// 1. Load the access credential from the store if not cached.
    /// 2. Load the renewal credential from the store if not cached.
    /// 3. Still no access credential: return `Ok(None)` -- the caller is
    ///    unauthenticated, which is not an error.
    /// 4. Cached and outside the expiry buffer: return it with no I/O.
    /// 5. Otherwise run (or join) the single-flight renewal.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Renewal`] when a renewal was required and
    /// failed. Credential state has already been cleared by then; the
    /// gateway treats this as a forced logout.
    pub async fn get_valid_credential(&self) -> Result<Option<Credential>> {
        let (has_access, has_renewal) = {
            let state = self.inner.state.lock().await;
            (state.access.is_some(), state.renewal.is_some())
        };
        if !has_access {
            self.inner.load_access().await;
        }
        if !has_renewal {
            self.inner.load_renewal().await;
        }

        let now = self.inner.clock.now_unix();
        {
            let state = self.inner.state.lock().await;
            match &state.access {
                None => return Ok(None),
                Some(credential)
                    if !credential.expires_within(now, self.inner.config.expiry_buffer_seconds) =>
                {
                    return Ok(Some(credential.clone()));
                }
                Some(_) => {}
            }
        }

        let credential = self.renew_access_credential().await?;
        Ok(Some(credential))
    }

    /// Renews the access credential, joining an in-flight renewal if one
    /// exists (single-flight).
    ///
    /// All concurrent callers resolve to the same outcome: the result of
    /// the one renewal request that actually reached the network.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Renewal`] when the renewal request fails or
    /// the server rejects the renewal credential. All credential state is
    /// cleared before the error is observed by any waiter.
    pub async fn renew_access_credential(&self) -> Result<Credential> {
        let shared = begin_or_join_renewal(&self.inner).await;
        match shared.await {
            Ok(credential) => Ok(credential),
            Err(message) => Err(SessionError::Renewal(message).into()),
        }
    }

    /// Persists the token pair issued at login and primes the cache.
    ///
    /// # Errors
    ///
    /// Returns a storage error when either token cannot be persisted; a
    /// login that cannot outlive the process should surface immediately.
    pub async fn store_login_credentials(&self, access: &str, renewal: &str) -> Result<()> {
        self.inner.store.set(ACCESS_CREDENTIAL_KEY, access).await?;
        self.inner.store.set(RENEWAL_CREDENTIAL_KEY, renewal).await?;
        self.inner.load_access().await;
        self.inner.load_renewal().await;
        tracing::info!("stored login credentials");
        Ok(())
    }

    /// Clears all credential state: cache, proactive timer, and stored
    /// keys (credentials plus session metadata).
    ///
    /// Idempotent and safe to call concurrently. Store failures are
    /// logged, never propagated -- the in-memory clear is unconditional,
    /// so the user-visible logout is guaranteed even when the store
    /// misbehaves.
    pub async fn clear_credentials(&self) -> Result<()> {
        self.inner.clear().await;
        Ok(())
    }

    /// Starts the proactive refresh timer, cancelling any previous one.
    ///
    /// Each tick reloads credential state from the store (the source of
    /// truth) and renews through the same single-flight path when the
    /// access credential is within the expiry buffer. A tick that finds no
    /// renewal credential stops the timer and clears all state: the
    /// session cannot be meaningfully extended.
    pub fn start_proactive_refresh(&self) {
        self.stop_proactive_refresh();

        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.proactive_refresh_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // An interval fires immediately; consume the first tick so the
            // timer waits a full period before its first check.
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => proactive_tick(&inner).await,
                }
            }
            tracing::debug!("proactive refresh timer stopped");
        });

        let mut guard = self
            .inner
            .refresh_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(RefreshTask { cancel, handle });
    }

    /// Stops the proactive refresh timer if one is running.
    pub fn stop_proactive_refresh(&self) {
        self.inner.stop_refresh_task();
    }

    /// Returns `true` while a proactive refresh timer is running.
    pub fn proactive_refresh_active(&self) -> bool {
        let guard = match self.inner.refresh_task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .as_ref()
            .map_or(false, |task| !task.cancel.is_cancelled() && !task.handle.is_finished())
    }

    /// Returns `true` while a renewal is in flight. Exposed for tests.
    pub async fn renewal_in_flight(&self) -> bool {
        self.inner.state.lock().await.renewal_in_flight
    }

    /// Returns a copy of the cached access credential, if any.
    pub async fn cached_access_credential(&self) -> Option<Credential> {
        self.inner.state.lock().await.access.clone()
    }

    /// Returns a copy of the cached renewal credential, if any.
    pub async fn cached_renewal_credential(&self) -> Option<Credential> {
        self.inner.state.lock().await.renewal.clone()
    }
}

// ---------------------------------------------------------------------------
// Single-flight renewal
// ---------------------------------------------------------------------------

/// Joins the in-flight renewal or starts a new one.
///
/// Holds the state lock only long enough to clone or install the shared
/// handle; the renewal itself runs outside the lock.
async fn begin_or_join_renewal(inner: &Arc<Inner>) -> SharedRenewal {
    let mut state = inner.state.lock().await;
    if let Some(existing) = &state.inflight {
        tracing::debug!("joining in-flight credential renewal");
        return existing.clone();
    }

    let task_inner = Arc::clone(inner);
    let future: Pin<Box<dyn Future<Output = RenewalOutcome> + Send>> =
        Box::pin(async move { run_renewal(task_inner).await });
    let shared = future.shared();
    state.renewal_in_flight = true;
    state.inflight = Some(shared.clone());
    shared
}

/// Runs one renewal and cleans up the single-flight state.
async fn run_renewal(inner: Arc<Inner>) -> RenewalOutcome {
    tracing::debug!("starting access credential renewal");
    let outcome = inner.perform_renewal().await;

    // Clear the flag and the shared handle before any waiter can observe
    // the outcome; a caller arriving after resolution must start a fresh
    // renewal rather than joining this finished one.
    {
        let mut state = inner.state.lock().await;
        state.renewal_in_flight = false;
        state.inflight = None;
    }

    match outcome {
        Ok(credential) => {
            tracing::info!(expires_at = credential.expires_at, "access credential renewed");
            Ok(credential)
        }
        Err(e) => {
            tracing::warn!("credential renewal failed: {e}; clearing session state");
            inner.clear().await;
            Err(e.to_string())
        }
    }
}

/// One proactive timer tick.
async fn proactive_tick(inner: &Arc<Inner>) {
    // Reload from the store: it is the source of truth, and a login or
    // logout elsewhere in the app may have changed it since the last tick.
    inner.load_access().await;
    let renewal = inner.load_renewal().await;

    if renewal.is_none() {
        tracing::info!("no renewal credential at proactive tick; session cannot be extended");
        inner.clear().await;
        return;
    }

    let now = inner.clock.now_unix();
    let expired = {
        let state = inner.state.lock().await;
        state
            .access
            .as_ref()
            .map_or(true, |c| c.expires_within(now, inner.config.expiry_buffer_seconds))
    };

    if expired {
        tracing::debug!("proactive tick found expiring access credential");
        let shared = begin_or_join_renewal(inner).await;
        // A failed renewal has already cleared state and stopped the timer.
        let _ = shared.await;
    }
}

// ---------------------------------------------------------------------------
// Inner
// ---------------------------------------------------------------------------

impl Inner {
    async fn load_access(&self) -> Option<Credential> {
        let raw = match self.store.get(ACCESS_CREDENTIAL_KEY).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("failed to read access credential from store: {e}");
                None
            }
        };

        let credential = raw.and_then(|raw| match decode_expiry(&raw) {
            Some(expires_at) => Some(Credential { raw, expires_at }),
            None => {
                tracing::warn!("stored access credential has no readable expiry claim; discarding");
                None
            }
        });

        let mut state = self.state.lock().await;
        state.access = credential.clone();
        credential
    }

    async fn load_renewal(&self) -> Option<Credential> {
        let raw = match self.store.get(RENEWAL_CREDENTIAL_KEY).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("failed to read renewal credential from store: {e}");
                None
            }
        };

        let credential = raw.map(|raw| {
            let expires_at = match decode_expiry(&raw) {
                Some(expires_at) => expires_at,
                None => {
                    tracing::debug!(
                        "renewal credential is not self-describing; assuming valid until renewal fails"
                    );
                    self.clock.now_unix() + FAR_FUTURE_SECS
                }
            };
            Credential { raw, expires_at }
        });

        let mut state = self.state.lock().await;
        state.renewal = credential.clone();
        credential
    }

    /// Calls the remote renewal endpoint and persists the result.
    ///
    /// Bypasses the gateway on purpose: routing this call through the 401
    /// handling path would recurse.
    async fn perform_renewal(&self) -> Result<Credential> {
        let renewal_raw = match self.store.get(RENEWAL_CREDENTIAL_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                return Err(
                    SessionError::Renewal("no renewal credential available".to_string()).into(),
                )
            }
            Err(e) => {
                return Err(SessionError::Renewal(format!(
                    "failed to read renewal credential: {e}"
                ))
                .into())
            }
        };

        let url = self.config.endpoint("/auth/refresh-token")?;
        let response = self
            .http
            .post(url)
            .timeout(self.config.request_timeout())
            .json(&RefreshRequest {
                refresh_token: &renewal_raw,
            })
            .send()
            .await
            .map_err(|e| SessionError::Renewal(format!("renewal request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                SessionError::Renewal(format!("renewal endpoint returned HTTP {status}")).into(),
            );
        }

        let envelope: RefreshEnvelope = response
            .json()
            .await
            .map_err(|e| SessionError::Renewal(format!("failed to parse renewal response: {e}")))?;

        if !envelope.is_success {
            let message = envelope
                .message
                .unwrap_or_else(|| "renewal rejected by server".to_string());
            return Err(SessionError::Renewal(message).into());
        }
        let data = envelope
            .data
            .ok_or_else(|| SessionError::Renewal("renewal response missing data".to_string()))?;

        let now = self.clock.now_unix();
        let expires_at = match decode_expiry(&data.access_token) {
            Some(expires_at) => expires_at,
            None => {
                tracing::warn!("renewed access credential has no readable expiry claim");
                now + FAR_FUTURE_SECS
            }
        };

        if let Err(e) = self.store.set(ACCESS_CREDENTIAL_KEY, &data.access_token).await {
            tracing::warn!("failed to persist renewed access credential: {e}");
        }
        let access = Credential {
            raw: data.access_token,
            expires_at,
        };

        let mut renewed_renewal = None;
        if let Some(new_renewal) = data.refresh_token {
            if let Err(e) = self.store.set(RENEWAL_CREDENTIAL_KEY, &new_renewal).await {
                tracing::warn!("failed to persist rotated renewal credential: {e}");
            }
            let renewal_expires = decode_expiry(&new_renewal).unwrap_or(now + FAR_FUTURE_SECS);
            renewed_renewal = Some(Credential {
                raw: new_renewal,
                expires_at: renewal_expires,
            });
        }

        let mut state = self.state.lock().await;
        state.access = Some(access.clone());
        if let Some(renewal) = renewed_renewal {
            state.renewal = Some(renewal);
        }

        Ok(access)
    }

    async fn clear(&self) {
        self.stop_refresh_task();

        {
            let mut state = self.state.lock().await;
            state.access = None;
            state.renewal = None;
        }

        if let Err(e) = self.store.remove(&SESSION_KEYS).await {
            tracing::warn!("failed to remove stored session keys: {e}");
        }
    }

    fn stop_refresh_task(&self) {
        let task = {
            let mut guard = match self.refresh_task.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.take()
        };
        if let Some(task) = task {
            // Cancel rather than abort: the timer task may be the caller
            // (a tick that found no renewal credential), and it must be
            // able to finish clearing state before it exits.
            task.cancel.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
