//! Open/close state machine for mini-app instances.
//!
//! At most one instance renders at any time, system-wide. The manager owns
//! that single slot as explicit state; everything else receives the active
//! `InstanceId` rather than consulting ambient globals.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use capsule_shared::{ConversationId, InstanceId, MessageId, MiniAppInstance};

/// Where one instance sits in `Closed → Opening → Open → Closing → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstancePhase {
    Closed,
    Opening,
    Open,
    Closing,
}

/// Notifications sent to the lifecycle/UI collaborator.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    InstanceOpened {
        instance_id: InstanceId,
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    InstanceClosed {
        instance_id: InstanceId,
    },
}

#[derive(Debug)]
struct Slot {
    instance: MiniAppInstance,
    phase: InstancePhase,
}

/// Owner of the single global "currently open" slot.
pub struct LifecycleManager {
    slot: Mutex<Option<Slot>>,
    events: mpsc::Sender<LifecycleEvent>,
}

impl LifecycleManager {
    /// Create the manager and the event feed consumed by the UI collaborator.
    pub fn new() -> (Self, mpsc::Receiver<LifecycleEvent>) {
        let (events, event_rx) = mpsc::channel(64);
        (
            Self {
                slot: Mutex::new(None),
                events,
            },
            event_rx,
        )
    }

    /// Open `instance`, silently preempting whatever was open before.
    ///
    /// Returns the preempted instance so the caller can tear down its
    /// transient state (gate cache, realtime membership). Opening the
    /// already-open instance is a no-op.
    pub fn open(&self, instance: MiniAppInstance) -> Option<MiniAppInstance> {
        let mut guard = match self.slot.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(slot) = guard.as_ref() {
            if slot.instance.instance_id == instance.instance_id {
                debug!(instance = %instance.instance_id.short(), "Instance already open");
                return None;
            }
        }

        // Preemption is immediate and silent: the single-instance invariant
        // is not subject to user confirmation.
        let preempted = guard.take().map(|mut slot| {
            slot.phase = InstancePhase::Closing;
            info!(
                closing = %slot.instance.instance_id.short(),
                opening = %instance.instance_id.short(),
                "Preempting open instance"
            );
            self.emit(LifecycleEvent::InstanceClosed {
                instance_id: slot.instance.instance_id.clone(),
            });
            slot.instance
        });

        // Opening is transient: the whole transition completes under the
        // slot lock, so outside observers only ever see Closed or Open.
        let mut slot = Slot {
            instance,
            phase: InstancePhase::Opening,
        };
        slot.phase = InstancePhase::Open;

        info!(
            instance = %slot.instance.instance_id.short(),
            conversation = %slot.instance.conversation_id,
            "Instance opened"
        );
        self.emit(LifecycleEvent::InstanceOpened {
            instance_id: slot.instance.instance_id.clone(),
            conversation_id: slot.instance.conversation_id,
            message_id: slot.instance.originating_message_id,
        });

        *guard = Some(slot);
        preempted
    }

    /// Close `instance_id` if it is the one currently open.
    ///
    /// Closing anything else is a no-op (`false`), not an error: stale close
    /// requests race preemptive opens and must not fail loudly. Permission
    /// grants are left untouched so consent survives re-opens.
    pub fn close(&self, instance_id: &InstanceId) -> bool {
        let mut guard = match self.slot.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        match guard.take() {
            Some(mut slot) if &slot.instance.instance_id == instance_id => {
                slot.phase = InstancePhase::Closing;
                info!(instance = %instance_id.short(), "Instance closed");
                self.emit(LifecycleEvent::InstanceClosed {
                    instance_id: instance_id.clone(),
                });
                true
            }
            other => {
                *guard = other;
                debug!(instance = %instance_id.short(), "Ignoring close for non-open instance");
                false
            }
        }
    }

    pub fn is_instance_open(&self) -> bool {
        self.slot
            .lock()
            .map(|g| g.is_some())
            .unwrap_or(false)
    }

    pub fn current_instance_id(&self) -> Option<InstanceId> {
        self.slot
            .lock()
            .ok()
            .and_then(|g| g.as_ref().map(|s| s.instance.instance_id.clone()))
    }

    pub fn current_instance(&self) -> Option<MiniAppInstance> {
        self.slot
            .lock()
            .ok()
            .and_then(|g| g.as_ref().map(|s| s.instance.clone()))
    }

    /// The phase of a given instance; anything not in the slot is `Closed`.
    pub fn phase(&self, instance_id: &InstanceId) -> InstancePhase {
        self.slot
            .lock()
            .ok()
            .and_then(|g| {
                g.as_ref()
                    .filter(|s| &s.instance.instance_id == instance_id)
                    .map(|s| s.phase)
            })
            .unwrap_or(InstancePhase::Closed)
    }

    fn emit(&self, event: LifecycleEvent) {
        if let Err(e) = self.events.try_send(event) {
            warn!(error = %e, "Lifecycle event dropped (collaborator not draining)");
        }
    }
}
