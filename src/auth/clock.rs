//! Clock abstraction for expiry evaluation
//!
//! The lifecycle manager never reads wall-clock time directly; it goes
//! through the [`Clock`] trait so tests can drive expiry with a manual
//! clock instead of sleeping.

use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" in seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Returns the current time in seconds since the Unix epoch.
    fn now_unix(&self) -> i64;
}

/// Production clock backed by the system time.
///
/// # Examples
///
/// ```
/// use mendhub_session::auth::clock::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// assert!(clock.now_unix() > 1_600_000_000);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Manually advanced clock for tests.
///
/// Kept in the library proper (not behind `cfg(test)`) so integration
/// tests and downstream consumers can construct lifecycle managers with a
/// controllable clock.
///
/// # Examples
///
/// ```
/// use mendhub_session::auth::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// clock.advance(500);
/// assert_eq!(clock.now_unix(), 1_500);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a manual clock frozen at `now` seconds since the epoch.
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Moves the clock forward by `seconds`.
    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Sets the clock to an absolute time.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
