//! # capsule-host
//!
//! Host-side authoritative state for embedded mini-apps: the permission
//! store and its TTL-cached capability gate, the append-only update log the
//! sandbox polls with a cursor, and the lifecycle manager that owns the
//! single global "currently open" slot.

pub mod gate;
pub mod lifecycle;
pub mod permissions;
pub mod update_log;

mod error;

pub use error::HostError;
pub use gate::CapabilityGate;
pub use lifecycle::{InstancePhase, LifecycleEvent, LifecycleManager};
pub use permissions::PermissionStore;
pub use update_log::{UpdateLog, UpdateRecord};
