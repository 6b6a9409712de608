//! Local persisted key/value store.
//!
//! The playground persists exactly three logical keys across restarts: the
//! guest execution counter and the two halves of the cached auth entry.
//! [`MemoryStore`] backs tests and throwaway embeddings, [`FileStore`]
//! persists to a single JSON file under the platform data directory.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Guest execution counter, a non-negative integer rendered as text.
pub const KEY_GUEST_EXECUTION_COUNT: &str = "guest_execution_count";
/// Cached identity snapshot, JSON-encoded.
pub const KEY_AUTH_IDENTITY: &str = "auth_identity";
/// Capture time of the cached identity, unix milliseconds as text.
pub const KEY_AUTH_CAPTURED_AT: &str = "auth_captured_at";

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(String),
    #[error("Malformed store file: {0}")]
    Malformed(String),
}

/// String key/value persistence shared by [`QuotaGate`](crate::quota::QuotaGate)
/// and [`SessionCache`](crate::session::SessionCache).
///
/// Implementations must tolerate concurrent access; each operation is one
/// atomic step from the caller's point of view.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
