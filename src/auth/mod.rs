//! Credential handling: parsing, persistence, and lifecycle
//!
//! The submodules split the concern into layers:
//!
//! - [`claims`] decodes self-describing token payloads (no verification).
//! - [`clock`] abstracts "now" so expiry logic is testable.
//! - [`store`] persists credentials (OS keyring in production).
//! - [`lifecycle`] owns caching, expiry evaluation, single-flight renewal,
//!   and the proactive refresh timer.

pub mod claims;
pub mod clock;
pub mod lifecycle;
pub mod store;

pub use claims::{decode_claims, decode_expiry, UntrustedClaims};
pub use clock::{Clock, ManualClock, SystemClock};
pub use lifecycle::{Credential, TokenLifecycleManager};
pub use store::{CredentialStore, KeyringStore, MemoryStore};
