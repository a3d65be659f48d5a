//! Append-only, serially-numbered state-update log, one per instance.
//!
//! The sandbox cannot hold a persistent push connection across its own
//! lifecycle, so it polls with a cursor. The log therefore supports
//! idempotent, resumable replay from any serial, including 0 (everything).

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use capsule_shared::InstanceId;

use crate::error::{HostError, Result};

/// One state-update event as stored and replayed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecord {
    /// 1-based, gap-free, strictly increasing within an instance.
    pub serial: u64,
    pub payload: Value,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory ordered update sequences keyed by instance.
///
/// Entries for one instance live under a single lock, so two concurrent
/// appends can never interleave into non-monotonic serials.
#[derive(Debug, Default)]
pub struct UpdateLog {
    inner: Mutex<HashMap<InstanceId, Vec<UpdateRecord>>>,
}

impl UpdateLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return its assigned serial (previous max + 1).
    pub fn append(&self, instance: &InstanceId, payload: Value, description: &str) -> Result<u64> {
        let mut guard = self.inner.lock().map_err(|_| HostError::StoreUnavailable)?;
        let records = guard.entry(instance.clone()).or_default();
        let serial = records.last().map(|r| r.serial).unwrap_or(0) + 1;

        records.push(UpdateRecord {
            serial,
            payload,
            description: description.to_string(),
            created_at: Utc::now(),
        });

        debug!(
            instance = %instance.short(),
            serial,
            description,
            "Appended update record"
        );
        Ok(serial)
    }

    /// All records with `serial > last_known_serial`, ascending. An empty
    /// vec (not an error) when the caller is already current.
    pub fn get_since(&self, instance: &InstanceId, last_known_serial: u64) -> Result<Vec<UpdateRecord>> {
        let guard = self.inner.lock().map_err(|_| HostError::StoreUnavailable)?;
        let records = match guard.get(instance) {
            Some(r) => r,
            None => return Ok(Vec::new()),
        };

        // Serials are contiguous from 1, so the cursor is also an index.
        let start = (last_known_serial as usize).min(records.len());
        Ok(records[start..].to_vec())
    }

    /// Highest serial assigned so far for an instance (0 when empty).
    pub fn head_serial(&self, instance: &InstanceId) -> Result<u64> {
        let guard = self.inner.lock().map_err(|_| HostError::StoreUnavailable)?;
        Ok(guard
            .get(instance)
            .and_then(|r| r.last())
            .map(|r| r.serial)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsule_shared::{ConversationId, MessageId, PackageRef};
    use serde_json::json;

    fn test_instance() -> InstanceId {
        InstanceId::derive(
            &ConversationId::new(),
            &MessageId::new(),
            &PackageRef([3u8; 32]),
        )
    }

    #[test]
    fn test_serials_gap_free_from_one() {
        let log = UpdateLog::new();
        let id = test_instance();

        for expected in 1..=10u64 {
            let serial = log.append(&id, json!({ "n": expected }), "tick").unwrap();
            assert_eq!(serial, expected);
        }
        assert_eq!(log.head_serial(&id).unwrap(), 10);
    }

    #[test]
    fn test_get_since_exact_and_ordered() {
        let log = UpdateLog::new();
        let id = test_instance();

        for n in 1..=5u64 {
            log.append(&id, json!({ "n": n }), "tick").unwrap();
        }

        let tail = log.get_since(&id, 2).unwrap();
        let serials: Vec<u64> = tail.iter().map(|r| r.serial).collect();
        assert_eq!(serials, vec![3, 4, 5]);

        // Idempotent: same cursor, same answer.
        let again = log.get_since(&id, 2).unwrap();
        assert_eq!(again.len(), tail.len());

        // Replay everything from zero.
        assert_eq!(log.get_since(&id, 0).unwrap().len(), 5);

        // Already current (or beyond): empty, not an error.
        assert!(log.get_since(&id, 5).unwrap().is_empty());
        assert!(log.get_since(&id, 99).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_instance_is_empty() {
        let log = UpdateLog::new();
        assert!(log.get_since(&test_instance(), 0).unwrap().is_empty());
    }

    #[test]
    fn test_instances_are_independent() {
        let log = UpdateLog::new();
        let a = test_instance();
        let b = test_instance();

        log.append(&a, json!(1), "a").unwrap();
        log.append(&a, json!(2), "a").unwrap();
        assert_eq!(log.append(&b, json!(1), "b").unwrap(), 1);
        assert_eq!(log.get_since(&b, 0).unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_appends_stay_monotonic() {
        use std::sync::Arc;

        let log = Arc::new(UpdateLog::new());
        let id = test_instance();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let log = log.clone();
                let id = id.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        log.append(&id, json!({}), "concurrent").unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let all = log.get_since(&id, 0).unwrap();
        assert_eq!(all.len(), 200);
        for (i, record) in all.iter().enumerate() {
            assert_eq!(record.serial, i as u64 + 1);
        }
    }
}
