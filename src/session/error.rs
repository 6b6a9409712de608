use thiserror::Error;

use crate::store::StoreError;

/// Errors from the identity/session layer.
///
/// `Network` and `InvalidResponse` are non-authoritative: callers must not
/// treat them as evidence that the user is signed out.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// An operation that needs a signed-in user ran without one.
    #[error("Authentication required")]
    AuthRequired,

    /// The identity service refused the username/password pair.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// The identity service refused the request outright, e.g. a taken
    /// username at registration.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The identity service could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The identity service answered with something unparsable.
    #[error("Invalid response from identity service: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
