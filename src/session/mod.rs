//! Identity and session state.
//!
//! A [`SessionCache`] fronts the identity service: it restores a persisted
//! sign-in at startup without a blocking round-trip, confirms it in the
//! background and only ever downgrades to guest on an authoritative answer.
//! The service itself sits behind [`IdentityBackend`]; implementations cover
//! the original HTTP endpoints, a guest-only offline mode and a scripted
//! fake for tests.

pub mod backend;
pub mod cache;
pub mod error;
pub mod http;
pub mod identity;

pub use backend::{FakeIdentityBackend, IdentityBackend, OfflineIdentityBackend, SessionProbe};
pub use cache::{SessionCache, AUTH_CACHE_TTL_MILLIS};
pub use error::SessionError;
pub use http::{HttpBackendConfig, HttpIdentityBackend};
pub use identity::{CachedAuth, Identity};
