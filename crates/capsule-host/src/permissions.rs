//! Per-instance capability grant records.
//!
//! The single source of truth for what a mini-app may do. Revocations are
//! visible to the very next query; any caching layered on top (the gate)
//! must never outlive this store's answer by more than its TTL.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;

use capsule_shared::{Capability, InstanceId};

use crate::error::{HostError, Result};

/// One grant/deny decision with the time it was made.
#[derive(Debug, Clone)]
struct GrantRecord {
    granted: bool,
    decided_at: DateTime<Utc>,
}

/// Process-wide record of granted capabilities, keyed by
/// `(InstanceId, Capability)`. Grants persist across close/re-open of the
/// same instance so user consent is not re-requested every session.
#[derive(Debug, Default)]
pub struct PermissionStore {
    inner: Mutex<HashMap<InstanceId, HashMap<Capability, GrantRecord>>>,
}

impl PermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, instance: &InstanceId, capability: Capability) -> Result<()> {
        self.decide(instance, capability, true)
    }

    pub fn revoke(&self, instance: &InstanceId, capability: Capability) -> Result<()> {
        self.decide(instance, capability, false)
    }

    fn decide(&self, instance: &InstanceId, capability: Capability, granted: bool) -> Result<()> {
        let mut guard = self.inner.lock().map_err(|_| HostError::StoreUnavailable)?;
        guard.entry(instance.clone()).or_default().insert(
            capability,
            GrantRecord {
                granted,
                decided_at: Utc::now(),
            },
        );
        debug!(
            instance = %instance.short(),
            capability = %capability,
            granted,
            "Recorded capability decision"
        );
        Ok(())
    }

    pub fn is_granted(&self, instance: &InstanceId, capability: Capability) -> Result<bool> {
        let guard = self.inner.lock().map_err(|_| HostError::StoreUnavailable)?;
        Ok(guard
            .get(instance)
            .and_then(|caps| caps.get(&capability))
            .map(|r| r.granted)
            .unwrap_or(false))
    }

    /// Snapshot of every currently granted capability for one instance.
    pub fn all_granted(&self, instance: &InstanceId) -> Result<HashSet<Capability>> {
        let guard = self.inner.lock().map_err(|_| HostError::StoreUnavailable)?;
        Ok(guard
            .get(instance)
            .map(|caps| {
                caps.iter()
                    .filter(|(_, r)| r.granted)
                    .map(|(c, _)| *c)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// When the most recent decision for this capability was made, if any.
    pub fn decided_at(
        &self,
        instance: &InstanceId,
        capability: Capability,
    ) -> Result<Option<DateTime<Utc>>> {
        let guard = self.inner.lock().map_err(|_| HostError::StoreUnavailable)?;
        Ok(guard
            .get(instance)
            .and_then(|caps| caps.get(&capability))
            .map(|r| r.decided_at))
    }
}
