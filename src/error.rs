use thiserror::Error;

use crate::engine::EngineError;
use crate::quota::QuotaError;
use crate::session::SessionError;
use crate::snippets::SnippetError;

/// Unified error surface of the playground facade.
///
/// Layer errors pass through transparently so callers can match on the
/// underlying kind; `RunInProgress` is the facade's own rejection for a
/// submit that raced an active run.
#[derive(Debug, Clone, Error)]
pub enum PlaygroundError {
    #[error("A run is already in progress")]
    RunInProgress,

    #[error(transparent)]
    Quota(#[from] QuotaError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Snippet(#[from] SnippetError),
}
