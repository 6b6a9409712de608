//! Guest execution quota.
//!
//! Guests get a fixed number of runs, tracked in the persisted store so the
//! count survives restarts. Signed-in users are never gated. The gate only
//! decides and records; callers own the ordering (check before the run,
//! record once the run is actually starting).

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::session::Identity;
use crate::store::{KeyValueStore, StoreError, KEY_GUEST_EXECUTION_COUNT};

/// Runs a guest may perform before being asked to sign in.
pub const GUEST_EXECUTION_LIMIT: u32 = 10;

#[derive(Debug, Clone, Error)]
pub enum QuotaError {
    #[error("Guest execution limit exceeded: {used}/{limit}")]
    LimitExceeded { limit: u32, used: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The gate's answer for one prospective run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub allowed: bool,
    /// Runs left for a guest; `None` for signed-in users.
    pub remaining: Option<u32>,
}

pub struct QuotaGate {
    store: Arc<dyn KeyValueStore>,
    limit: u32,
    // Serializes read-modify-write on the persisted counter.
    lock: Mutex<()>,
}

impl QuotaGate {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_limit(store, GUEST_EXECUTION_LIMIT)
    }

    pub fn with_limit(store: Arc<dyn KeyValueStore>, limit: u32) -> Self {
        Self {
            store,
            limit,
            lock: Mutex::new(()),
        }
    }

    /// Executions recorded so far. An absent or unreadable counter reads
    /// as zero.
    pub fn used(&self) -> Result<u32, QuotaError> {
        let raw = self.store.get(KEY_GUEST_EXECUTION_COUNT)?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Decide whether a run may start for this identity.
    pub fn may_execute(&self, identity: Option<&Identity>) -> Result<GateDecision, QuotaError> {
        if identity.is_some() {
            return Ok(GateDecision {
                allowed: true,
                remaining: None,
            });
        }
        let used = self.used()?;
        Ok(GateDecision {
            allowed: used < self.limit,
            remaining: Some(self.limit.saturating_sub(used)),
        })
    }

    /// Same decision as [`may_execute`](Self::may_execute), as a gate result.
    pub fn check(&self, identity: Option<&Identity>) -> Result<(), QuotaError> {
        if identity.is_some() {
            return Ok(());
        }
        let used = self.used()?;
        if used >= self.limit {
            return Err(QuotaError::LimitExceeded {
                limit: self.limit,
                used,
            });
        }
        Ok(())
    }

    /// Count one guest run. Call only after the gate passed and the run is
    /// actually starting.
    pub fn record_execution(&self) -> Result<u32, QuotaError> {
        let _guard = self.lock.lock();
        let used = self.used()?.saturating_add(1);
        self.store
            .put(KEY_GUEST_EXECUTION_COUNT, &used.to_string())?;
        debug!(used, limit = self.limit, "guest execution recorded");
        Ok(used)
    }

    /// Zero the counter. Wired to successful login.
    pub fn reset(&self) -> Result<(), QuotaError> {
        let _guard = self.lock.lock();
        self.store.put(KEY_GUEST_EXECUTION_COUNT, "0")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn gate_with_limit(limit: u32) -> (QuotaGate, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (QuotaGate::with_limit(store.clone(), limit), store)
    }

    fn signed_in() -> Identity {
        Identity {
            id: 1,
            display_name: "ada".to_string(),
        }
    }

    #[test]
    fn test_guest_counts_down_to_limit() {
        let (gate, _store) = gate_with_limit(3);
        for used in 0..3 {
            let decision = gate.may_execute(None).unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, Some(3 - used));
            gate.record_execution().unwrap();
        }

        let decision = gate.may_execute(None).unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, Some(0));

        match gate.check(None).unwrap_err() {
            QuotaError::LimitExceeded { limit, used } => {
                assert_eq!(limit, 3);
                assert_eq!(used, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_signed_in_user_is_never_gated() {
        let (gate, _store) = gate_with_limit(0);
        let identity = signed_in();
        assert!(gate.may_execute(Some(&identity)).unwrap().allowed);
        assert_eq!(gate.may_execute(Some(&identity)).unwrap().remaining, None);
        gate.check(Some(&identity)).unwrap();
    }

    #[test]
    fn test_counter_survives_through_store() {
        let store = Arc::new(MemoryStore::new());
        {
            let gate = QuotaGate::with_limit(store.clone(), 10);
            gate.record_execution().unwrap();
            gate.record_execution().unwrap();
        }
        let gate = QuotaGate::with_limit(store, 10);
        assert_eq!(gate.used().unwrap(), 2);
    }

    #[test]
    fn test_unreadable_counter_reads_as_zero() {
        let (gate, store) = gate_with_limit(10);
        store.put(KEY_GUEST_EXECUTION_COUNT, "three").unwrap();
        assert_eq!(gate.used().unwrap(), 0);
        assert_eq!(gate.record_execution().unwrap(), 1);
    }

    #[test]
    fn test_reset_zeroes_counter() {
        let (gate, store) = gate_with_limit(10);
        gate.record_execution().unwrap();
        gate.reset().unwrap();
        assert_eq!(gate.used().unwrap(), 0);
        assert_eq!(
            store.get(KEY_GUEST_EXECUTION_COUNT).unwrap().as_deref(),
            Some("0")
        );
    }

    #[test]
    fn test_default_limit_is_ten() {
        let gate = QuotaGate::new(Arc::new(MemoryStore::new()));
        assert_eq!(gate.may_execute(None).unwrap().remaining, Some(10));
    }
}
