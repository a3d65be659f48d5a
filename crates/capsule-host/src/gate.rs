//! TTL-cached decision layer in front of the permission store.
//!
//! Sandboxed content issues bursts of capability checks (several media-API
//! wrappers constructed at startup), so one store query per check would be
//! wasteful. The gate caches the *entire* granted-set snapshot per instance
//! for a short window; staleness is bounded by the TTL and the store stays
//! the only authority.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use capsule_shared::constants::PERMISSION_CACHE_TTL_SECS;
use capsule_shared::{Capability, InstanceId};

use crate::permissions::PermissionStore;

#[derive(Debug, Clone)]
struct CachedGrants {
    granted: HashSet<Capability>,
    fetched_at: Instant,
}

/// Caching decorator over [`PermissionStore`].
pub struct CapabilityGate {
    store: Arc<PermissionStore>,
    ttl: Duration,
    cache: Mutex<HashMap<InstanceId, CachedGrants>>,
}

impl CapabilityGate {
    pub fn new(store: Arc<PermissionStore>) -> Self {
        Self::with_ttl(store, Duration::from_secs(PERMISSION_CACHE_TTL_SECS))
    }

    /// Construct with an explicit TTL (tests use very short windows).
    pub fn with_ttl(store: Arc<PermissionStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `capability` is currently granted to `instance`.
    ///
    /// Serves from the per-instance snapshot while it is fresh; on miss or
    /// expiry, refreshes the whole granted set in one store query. A store
    /// failure answers `false`.
    pub fn check_permission(&self, instance: &InstanceId, capability: Capability) -> bool {
        let now = Instant::now();

        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(_) => {
                // Cache unusable; fall through to the authoritative store.
                return self.store.is_granted(instance, capability).unwrap_or(false);
            }
        };

        if let Some(entry) = cache.get(instance) {
            if now.duration_since(entry.fetched_at) < self.ttl {
                return entry.granted.contains(&capability);
            }
        }

        match self.store.all_granted(instance) {
            Ok(granted) => {
                let allowed = granted.contains(&capability);
                debug!(
                    instance = %instance.short(),
                    granted = granted.len(),
                    "Refreshed capability snapshot"
                );
                cache.insert(
                    instance.clone(),
                    CachedGrants {
                        granted,
                        fetched_at: now,
                    },
                );
                allowed
            }
            Err(e) => {
                warn!(
                    instance = %instance.short(),
                    error = %e,
                    "Permission store query failed, denying"
                );
                cache.remove(instance);
                false
            }
        }
    }

    /// Drop the cached snapshot for one instance. Called on lifecycle
    /// transitions so teardown never serves a stale grant.
    pub fn invalidate(&self, instance: &InstanceId) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(instance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsule_shared::{ConversationId, MessageId, PackageRef};

    fn test_instance() -> InstanceId {
        InstanceId::derive(
            &ConversationId::new(),
            &MessageId::new(),
            &PackageRef([2u8; 32]),
        )
    }

    #[test]
    fn test_denied_by_default() {
        let store = Arc::new(PermissionStore::new());
        let gate = CapabilityGate::new(store);
        assert!(!gate.check_permission(&test_instance(), Capability::Camera));
    }

    #[test]
    fn test_warm_cache_serves_burst() {
        let store = Arc::new(PermissionStore::new());
        let id = test_instance();
        store.grant(&id, Capability::Microphone).unwrap();
        store.grant(&id, Capability::Camera).unwrap();

        let gate = CapabilityGate::new(store.clone());
        // First check pulls the whole snapshot; the rest hit the cache.
        assert!(gate.check_permission(&id, Capability::Microphone));
        assert!(gate.check_permission(&id, Capability::Camera));
        assert!(!gate.check_permission(&id, Capability::Geolocation));
    }

    #[test]
    fn test_revocation_observed_after_ttl() {
        let store = Arc::new(PermissionStore::new());
        let id = test_instance();
        store.grant(&id, Capability::ClipboardRead).unwrap();

        let gate = CapabilityGate::with_ttl(store.clone(), Duration::from_millis(20));
        assert!(gate.check_permission(&id, Capability::ClipboardRead));

        store.revoke(&id, Capability::ClipboardRead).unwrap();
        // Still inside the TTL window: the warm cache may answer stale.
        std::thread::sleep(Duration::from_millis(30));
        assert!(!gate.check_permission(&id, Capability::ClipboardRead));
    }

    #[test]
    fn test_invalidate_drops_snapshot() {
        let store = Arc::new(PermissionStore::new());
        let id = test_instance();
        store.grant(&id, Capability::DisplayCapture).unwrap();

        let gate = CapabilityGate::new(store.clone());
        assert!(gate.check_permission(&id, Capability::DisplayCapture));

        store.revoke(&id, Capability::DisplayCapture).unwrap();
        gate.invalidate(&id);
        // No TTL wait needed once the snapshot is dropped.
        assert!(!gate.check_permission(&id, Capability::DisplayCapture));
    }
}
