use thiserror::Error;

/// Engine-level failures.
///
/// `Clone` matters here: concurrent `initialize()` callers all await one
/// shared attempt and each receives the same error value. User-code faults
/// are not in this enum; they travel inside
/// [`ExecutionReport::error`](super::ExecutionReport).
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Interpreter bundle load failed: {0}")]
    ScriptLoadFailed(String),
    #[error("Interpreter initialization failed: {0}")]
    InitializationFailed(String),
    #[error("Engine unavailable: {0}")]
    Unavailable(String),
    #[error("Package install failed for '{package}': {message}")]
    PackageInstall { package: String, message: String },
}
