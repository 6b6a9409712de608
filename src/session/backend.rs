use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::SessionError;
use super::identity::Identity;

/// Authoritative answer to "who does the service think is signed in?".
///
/// Transport failures are *not* probes; they surface as
/// [`SessionError::Network`] / [`SessionError::InvalidResponse`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionProbe {
    SignedIn(Identity),
    SignedOut,
}

/// The identity service seam.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Ask the service who is signed in.
    async fn check_session(&self) -> Result<SessionProbe, SessionError>;

    async fn login(&self, username: &str, password: &str) -> Result<Identity, SessionError>;

    async fn logout(&self) -> Result<(), SessionError>;

    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, SessionError>;
}

/// Backend for deployments with no identity service configured. Checks and
/// sign-in attempts report the service as unreachable, never an
/// authoritative sign-out, so a cached identity is left alone and the
/// session layer degrades to guest on its own.
#[derive(Debug, Default)]
pub struct OfflineIdentityBackend;

#[async_trait]
impl IdentityBackend for OfflineIdentityBackend {
    async fn check_session(&self) -> Result<SessionProbe, SessionError> {
        Err(SessionError::Network(
            "identity service not configured".to_string(),
        ))
    }

    async fn login(&self, _username: &str, _password: &str) -> Result<Identity, SessionError> {
        Err(SessionError::Network(
            "identity service not configured".to_string(),
        ))
    }

    async fn logout(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn register(
        &self,
        _username: &str,
        _email: &str,
        _password: &str,
    ) -> Result<Identity, SessionError> {
        Err(SessionError::Network(
            "identity service not configured".to_string(),
        ))
    }
}

/// In-memory backend for tests: holds accounts, tracks sign-in state and
/// lets tests script `check_session` responses probe by probe.
#[derive(Default)]
pub struct FakeIdentityBackend {
    accounts: Mutex<HashMap<String, (String, Identity)>>,
    signed_in: Mutex<Option<Identity>>,
    probes: Mutex<std::collections::VecDeque<Result<SessionProbe, SessionError>>>,
    next_id: AtomicI64,
    check_calls: AtomicU32,
    fail_next_logout: AtomicBool,
}

impl FakeIdentityBackend {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    pub fn with_account(self, username: &str, password: &str) -> Self {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let identity = Identity {
            id,
            display_name: username.to_string(),
        };
        self.accounts
            .lock()
            .insert(username.to_string(), (password.to_string(), identity));
        self
    }

    /// Queue one scripted `check_session` response. When the queue is empty
    /// the fake reports its own sign-in state.
    pub fn push_probe(&self, probe: Result<SessionProbe, SessionError>) {
        self.probes.lock().push_back(probe);
    }

    pub fn fail_next_logout(&self) {
        self.fail_next_logout.store(true, Ordering::SeqCst);
    }

    pub fn check_calls(&self) -> u32 {
        self.check_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityBackend for FakeIdentityBackend {
    async fn check_session(&self) -> Result<SessionProbe, SessionError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(probe) = self.probes.lock().pop_front() {
            return probe;
        }
        Ok(match self.signed_in.lock().clone() {
            Some(identity) => SessionProbe::SignedIn(identity),
            None => SessionProbe::SignedOut,
        })
    }

    async fn login(&self, username: &str, password: &str) -> Result<Identity, SessionError> {
        let identity = match self.accounts.lock().get(username) {
            Some((stored, identity)) if stored == password => identity.clone(),
            _ => return Err(SessionError::InvalidCredentials),
        };
        *self.signed_in.lock() = Some(identity.clone());
        Ok(identity)
    }

    async fn logout(&self) -> Result<(), SessionError> {
        if self.fail_next_logout.swap(false, Ordering::SeqCst) {
            return Err(SessionError::Network("connection reset".to_string()));
        }
        *self.signed_in.lock() = None;
        Ok(())
    }

    async fn register(
        &self,
        username: &str,
        _email: &str,
        password: &str,
    ) -> Result<Identity, SessionError> {
        let mut accounts = self.accounts.lock();
        if accounts.contains_key(username) {
            return Err(SessionError::Rejected(
                "Username or email already exists".to_string(),
            ));
        }
        let identity = Identity {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            display_name: username.to_string(),
        };
        accounts.insert(
            username.to_string(),
            (password.to_string(), identity.clone()),
        );
        Ok(identity)
    }
}
