//! Cached session state.
//!
//! The cache answers "who is signed in?" without blocking startup on the
//! identity service. A persisted snapshot younger than
//! [`AUTH_CACHE_TTL_MILLIS`] is adopted immediately and confirmed in the
//! background; the snapshot is downgraded only when the service
//! authoritatively reports nobody signed in. Transport failures leave both
//! the live identity and the persisted snapshot untouched.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::core::RuntimeContext;
use crate::store::{KeyValueStore, StoreError, KEY_AUTH_CAPTURED_AT, KEY_AUTH_IDENTITY};

use super::backend::{IdentityBackend, SessionProbe};
use super::error::SessionError;
use super::identity::{CachedAuth, Identity};

/// How long a persisted identity snapshot may be adopted without server
/// confirmation.
pub const AUTH_CACHE_TTL_MILLIS: i64 = 24 * 60 * 60 * 1000;

pub struct SessionCache {
    backend: Arc<dyn IdentityBackend>,
    store: Arc<dyn KeyValueStore>,
    context: RuntimeContext,
    current: RwLock<Option<Identity>>,
}

impl SessionCache {
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        store: Arc<dyn KeyValueStore>,
        context: RuntimeContext,
    ) -> Self {
        Self {
            backend,
            store,
            context,
            current: RwLock::new(None),
        }
    }

    /// The identity this process currently acts as. `None` means guest.
    pub fn identity(&self) -> Option<Identity> {
        self.current.read().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.read().is_some()
    }

    /// Restore session state at startup.
    ///
    /// A fresh persisted snapshot is adopted without waiting; the service is
    /// asked to confirm it in a background task. A stale or absent snapshot
    /// triggers a foreground check, degrading to guest if the service cannot
    /// be reached.
    pub async fn bootstrap(self: &Arc<Self>) -> Result<Option<Identity>, SessionError> {
        if let Some(cached) = self.read_cached()? {
            if cached.is_fresh(self.context.now_millis(), AUTH_CACHE_TTL_MILLIS) {
                *self.current.write() = Some(cached.identity.clone());
                debug!(user = %cached.identity.display_name, "adopted cached session");
                let cache = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(err) = cache.refresh().await {
                        debug!(error = %err, "background session confirm failed");
                    }
                });
                return Ok(Some(cached.identity));
            }
        }

        match self.refresh().await {
            Ok(identity) => Ok(identity),
            Err(SessionError::Network(err)) => {
                warn!(error = %err, "session check unreachable, continuing as guest");
                Ok(None)
            }
            Err(SessionError::InvalidResponse(err)) => {
                warn!(error = %err, "session check unparsable, continuing as guest");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Ask the identity service who is signed in and reconcile local state
    /// with the answer.
    ///
    /// Only an authoritative signed-out answer evicts the snapshot; transport
    /// failures propagate as errors with all local state kept.
    pub async fn refresh(&self) -> Result<Option<Identity>, SessionError> {
        match self.backend.check_session().await? {
            SessionProbe::SignedIn(identity) => {
                self.persist(&identity)?;
                *self.current.write() = Some(identity.clone());
                Ok(Some(identity))
            }
            SessionProbe::SignedOut => {
                *self.current.write() = None;
                self.evict()?;
                Ok(None)
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, SessionError> {
        let identity = self.backend.login(username, password).await?;
        self.persist(&identity)?;
        *self.current.write() = Some(identity.clone());
        Ok(identity)
    }

    /// Sign out. Local state is cleared only after the service acknowledges;
    /// a failed call leaves the identity and the snapshot unchanged.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.backend.logout().await?;
        *self.current.write() = None;
        self.evict()?;
        Ok(())
    }

    /// Create an account. The new identity is returned but not adopted; the
    /// caller decides when to sign in with it.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, SessionError> {
        self.backend.register(username, email, password).await
    }

    fn read_cached(&self) -> Result<Option<CachedAuth>, SessionError> {
        let raw_identity = match self.store.get(KEY_AUTH_IDENTITY)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let raw_captured = match self.store.get(KEY_AUTH_CAPTURED_AT)? {
            Some(raw) => raw,
            None => {
                // Half-written snapshot; drop it.
                self.evict()?;
                return Ok(None);
            }
        };

        let identity: Identity = match serde_json::from_str(&raw_identity) {
            Ok(identity) => identity,
            Err(err) => {
                warn!(error = %err, "discarding unreadable session snapshot");
                self.evict()?;
                return Ok(None);
            }
        };
        let captured_at_millis: i64 = match raw_captured.parse() {
            Ok(millis) => millis,
            Err(_) => {
                warn!("discarding session snapshot with unreadable timestamp");
                self.evict()?;
                return Ok(None);
            }
        };
        Ok(Some(CachedAuth::new(identity, captured_at_millis)))
    }

    fn persist(&self, identity: &Identity) -> Result<(), SessionError> {
        let json = serde_json::to_string(identity)
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        self.store.put(KEY_AUTH_IDENTITY, &json)?;
        self.store
            .put(KEY_AUTH_CAPTURED_AT, &self.context.now_millis().to_string())?;
        Ok(())
    }

    fn evict(&self) -> Result<(), SessionError> {
        self.store.remove(KEY_AUTH_IDENTITY)?;
        self.store.remove(KEY_AUTH_CAPTURED_AT)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FakeTimeProvider;
    use crate::session::backend::{FakeIdentityBackend, OfflineIdentityBackend};
    use crate::store::MemoryStore;

    fn cache_at(
        millis: i64,
        backend: Arc<FakeIdentityBackend>,
    ) -> (Arc<SessionCache>, Arc<MemoryStore>, Arc<FakeTimeProvider>) {
        let time = Arc::new(FakeTimeProvider::new(millis));
        let context = RuntimeContext::default().with_time_provider(time.clone());
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(SessionCache::new(backend, store.clone(), context));
        (cache, store, time)
    }

    #[tokio::test]
    async fn test_login_persists_snapshot() {
        let backend = Arc::new(FakeIdentityBackend::new().with_account("ada", "pw"));
        let (cache, store, _time) = cache_at(5_000, backend);

        let identity = cache.login("ada", "pw").await.unwrap();
        assert_eq!(cache.identity(), Some(identity.clone()));

        let raw = store.get(KEY_AUTH_IDENTITY).unwrap().unwrap();
        let stored: Identity = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored, identity);
        assert_eq!(
            store.get(KEY_AUTH_CAPTURED_AT).unwrap().as_deref(),
            Some("5000")
        );
    }

    #[tokio::test]
    async fn test_refresh_confirmation_renews_timestamp() {
        let backend = Arc::new(FakeIdentityBackend::new().with_account("ada", "pw"));
        let (cache, store, time) = cache_at(5_000, backend);
        cache.login("ada", "pw").await.unwrap();

        time.set_millis(9_000);
        cache.refresh().await.unwrap();
        assert_eq!(
            store.get(KEY_AUTH_CAPTURED_AT).unwrap().as_deref(),
            Some("9000")
        );
    }

    #[tokio::test]
    async fn test_refresh_signed_out_evicts() {
        let backend = Arc::new(FakeIdentityBackend::new().with_account("ada", "pw"));
        let (cache, store, _time) = cache_at(5_000, backend.clone());
        cache.login("ada", "pw").await.unwrap();

        backend.push_probe(Ok(SessionProbe::SignedOut));
        assert_eq!(cache.refresh().await.unwrap(), None);
        assert_eq!(cache.identity(), None);
        assert!(store.get(KEY_AUTH_IDENTITY).unwrap().is_none());
        assert!(store.get(KEY_AUTH_CAPTURED_AT).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_network_error_keeps_identity() {
        let backend = Arc::new(FakeIdentityBackend::new().with_account("ada", "pw"));
        let (cache, store, _time) = cache_at(5_000, backend.clone());
        let identity = cache.login("ada", "pw").await.unwrap();

        backend.push_probe(Err(SessionError::Network("tunnel closed".to_string())));
        let err = cache.refresh().await.unwrap_err();
        assert!(matches!(err, SessionError::Network(_)));

        assert_eq!(cache.identity(), Some(identity));
        assert!(store.get(KEY_AUTH_IDENTITY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_refresh_invalid_response_keeps_identity() {
        let backend = Arc::new(FakeIdentityBackend::new().with_account("ada", "pw"));
        let (cache, _store, _time) = cache_at(5_000, backend.clone());
        let identity = cache.login("ada", "pw").await.unwrap();

        backend.push_probe(Err(SessionError::InvalidResponse("html".to_string())));
        cache.refresh().await.unwrap_err();
        assert_eq!(cache.identity(), Some(identity));
    }

    #[tokio::test]
    async fn test_logout_clears_identity_and_snapshot() {
        let backend = Arc::new(FakeIdentityBackend::new().with_account("ada", "pw"));
        let (cache, store, _time) = cache_at(5_000, backend);
        cache.login("ada", "pw").await.unwrap();

        cache.logout().await.unwrap();
        assert_eq!(cache.identity(), None);
        assert!(store.get(KEY_AUTH_IDENTITY).unwrap().is_none());
        assert!(store.get(KEY_AUTH_CAPTURED_AT).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_failure_keeps_local_state() {
        let backend = Arc::new(FakeIdentityBackend::new().with_account("ada", "pw"));
        let (cache, store, _time) = cache_at(5_000, backend.clone());
        let identity = cache.login("ada", "pw").await.unwrap();

        backend.fail_next_logout();
        let err = cache.logout().await.unwrap_err();
        assert!(matches!(err, SessionError::Network(_)));
        assert_eq!(cache.identity(), Some(identity));
        assert!(store.get(KEY_AUTH_IDENTITY).unwrap().is_some());
        assert!(store.get(KEY_AUTH_CAPTURED_AT).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_offline_confirm_keeps_cached_identity() {
        let time = Arc::new(FakeTimeProvider::new(10_000));
        let context = RuntimeContext::default().with_time_provider(time);
        let store = Arc::new(MemoryStore::new());
        let ada = Identity {
            id: 7,
            display_name: "ada".to_string(),
        };
        store
            .put(KEY_AUTH_IDENTITY, &serde_json::to_string(&ada).unwrap())
            .unwrap();
        store.put(KEY_AUTH_CAPTURED_AT, "9000").unwrap();
        let cache = Arc::new(SessionCache::new(
            Arc::new(OfflineIdentityBackend),
            store.clone(),
            context,
        ));

        assert_eq!(cache.bootstrap().await.unwrap(), Some(ada.clone()));

        // Let the background confirm run; its transport error must not evict.
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.identity(), Some(ada));
        assert!(store.get(KEY_AUTH_IDENTITY).unwrap().is_some());
        assert!(store.get(KEY_AUTH_CAPTURED_AT).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unreadable_snapshot_is_discarded() {
        let backend = Arc::new(FakeIdentityBackend::new());
        let (cache, store, _time) = cache_at(5_000, backend);
        store.put(KEY_AUTH_IDENTITY, "not json").unwrap();
        store.put(KEY_AUTH_CAPTURED_AT, "4000").unwrap();

        assert_eq!(cache.bootstrap().await.unwrap(), None);
        assert!(store.get(KEY_AUTH_IDENTITY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_does_not_adopt_identity() {
        let backend = Arc::new(FakeIdentityBackend::new());
        let (cache, store, _time) = cache_at(5_000, backend);

        let identity = cache
            .register("lin", "lin@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(identity.display_name, "lin");
        assert_eq!(cache.identity(), None);
        assert!(store.get(KEY_AUTH_IDENTITY).unwrap().is_none());
    }
}
