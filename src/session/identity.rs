use serde::{Deserialize, Serialize};

/// A signed-in account as confirmed by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub display_name: String,
}

/// An identity plus the instant the service last confirmed it, as persisted
/// in the key-value store between launches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAuth {
    pub identity: Identity,
    pub captured_at_millis: i64,
}

impl CachedAuth {
    pub fn new(identity: Identity, captured_at_millis: i64) -> Self {
        Self {
            identity,
            captured_at_millis,
        }
    }

    /// Whether the capture is recent enough to adopt without waiting for a
    /// server round-trip.
    pub fn is_fresh(&self, now_millis: i64, ttl_millis: i64) -> bool {
        now_millis - self.captured_at_millis < ttl_millis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: 7,
            display_name: "ada".to_string(),
        }
    }

    #[test]
    fn test_freshness_boundary() {
        let cached = CachedAuth::new(identity(), 1_000);
        assert!(cached.is_fresh(1_000 + 499, 500));
        assert!(!cached.is_fresh(1_000 + 500, 500));
    }

    #[test]
    fn test_future_capture_counts_as_fresh() {
        // A clock that moved backwards must not force a re-auth.
        let cached = CachedAuth::new(identity(), 2_000);
        assert!(cached.is_fresh(1_000, 500));
    }

    #[test]
    fn test_cached_auth_round_trips_through_json() {
        let cached = CachedAuth::new(identity(), 42);
        let json = serde_json::to_string(&cached).unwrap();
        let back: CachedAuth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cached);
    }
}
