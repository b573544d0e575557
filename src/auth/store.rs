//! Credential persistence
//!
//! This module defines the [`CredentialStore`] trait -- a small persistent
//! key/value surface over which the lifecycle manager stores the access and
//! renewal credentials plus the session metadata that must be cleared
//! atomically with them on logout.
//!
//! Two implementations ship with the crate:
//!
//! - [`KeyringStore`] persists values in the operating system's native
//!   credential store (Keychain on macOS, Secret Service on Linux, Windows
//!   Credential Manager on Windows).
//! - [`MemoryStore`] keeps values in a process-local map; it exists for
//!   tests and for platforms where no keyring is available.
//!
//! The store is the single source of truth: the lifecycle manager's
//! in-memory cache is an optimization and must always be reloadable from
//! here. Only the lifecycle manager writes to the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, SessionError};

/// Store key for the short-lived access credential.
pub const ACCESS_CREDENTIAL_KEY: &str = "access-credential";

/// Store key for the long-lived renewal credential.
pub const RENEWAL_CREDENTIAL_KEY: &str = "renewal-credential";

/// Store key for the cached user profile blob.
pub const USER_PROFILE_KEY: &str = "user-profile";

/// Store key for the cached user type ("customer" / "technician").
pub const USER_TYPE_KEY: &str = "user-type";

/// Every key that must be removed together on logout.
pub const SESSION_KEYS: [&str; 4] = [
    ACCESS_CREDENTIAL_KEY,
    RENEWAL_CREDENTIAL_KEY,
    USER_PROFILE_KEY,
    USER_TYPE_KEY,
];

/// Durable key/value persistence for session credentials.
///
/// Implementations must treat a missing key as `Ok(None)`, reserving
/// errors for genuine storage failures so callers can distinguish "not
/// logged in yet" from "the store is broken".
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Reads the value stored under `key`, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes every key in `keys`. Missing keys are not an error.
    async fn remove(&self, keys: &[&str]) -> Result<()>;
}

// ---------------------------------------------------------------------------
// KeyringStore
// ---------------------------------------------------------------------------

/// [`CredentialStore`] backed by the OS native keyring.
///
/// Each key is stored as its own keyring entry under a shared service
/// name, so the access credential, renewal credential, and session
/// metadata stay independent entries that can be removed together.
///
/// # Examples
///
/// ```no_run
/// use mendhub_session::auth::store::{CredentialStore, KeyringStore};
///
/// # async fn example() -> mendhub_session::Result<()> {
/// let store = KeyringStore::new("mendhub");
/// store.set("access-credential", "eyJ...").await?;
/// let loaded = store.get("access-credential").await?;
/// assert!(loaded.is_some());
/// # Ok(())
/// # }
/// ```
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Creates a store whose entries live under `service` in the keyring.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        let entry = keyring::Entry::new(&self.service, key).map_err(SessionError::Keyring)?;
        Ok(entry)
    }
}

#[async_trait]
impl CredentialStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entry = self.entry(key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(SessionError::Keyring(e).into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let entry = self.entry(key)?;
        entry.set_password(value).map_err(SessionError::Keyring)?;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            let entry = self.entry(key)?;
            match entry.delete_password() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => return Err(SessionError::Keyring(e).into()),
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process [`CredentialStore`] for tests and keyring-less platforms.
///
/// Reads can be made to fail on demand via [`MemoryStore::fail_reads`],
/// which lets tests exercise the "storage error is treated as a cache
/// miss" degradation path without a broken keyring.
///
/// # Examples
///
/// ```
/// use mendhub_session::auth::store::{CredentialStore, MemoryStore};
///
/// # async fn example() -> mendhub_session::Result<()> {
/// let store = MemoryStore::default();
/// store.set("access-credential", "tok").await?;
/// assert_eq!(store.get("access-credential").await?.as_deref(), Some("tok"));
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// When `fail` is true, every subsequent `get` returns a storage error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Returns a snapshot of the stored keys, for assertions in tests.
    pub fn keys(&self) -> Vec<String> {
        match self.entries.lock() {
            Ok(guard) => guard.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SessionError::Storage("simulated read failure".to_string()).into());
        }
        let guard = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for key in keys {
            guard.remove(*key);
        }
        Ok(())
    }
}
