//! The single IPC entry point callable from inside the rendering sandbox.
//!
//! Every operation converts internal failures into structured JSON results;
//! nothing raised here ever crosses the sandbox boundary, so one failed
//! call cannot destabilize the mini-app's execution or other pending calls.

use std::sync::{Arc, Mutex, RwLock};

use serde_json::{json, Value};
use tracing::{debug, warn};

use capsule_host::{CapabilityGate, LifecycleManager, PermissionStore, UpdateLog};
use capsule_realtime::CoordinatorHandle;
use capsule_shared::constants::MAX_REALTIME_FRAME_SIZE;
use capsule_shared::{Capability, HostIdentity, InstanceId, MiniAppInstance, TopicId, UserId};

use crate::commands::{CommandCtx, CommandError, CommandRegistry};

fn error_json(message: impl AsRef<str>) -> Value {
    json!({ "error": message.as_ref() })
}

/// The capability bridge: routes commands, update sends, update polls, and
/// realtime frames between one open sandbox and the host components.
pub struct CapsuleBridge {
    ctx: CommandCtx,
    registry: RwLock<CommandRegistry>,
    coordinator: CoordinatorHandle,
    /// Conversation participants of the currently open instance, used to
    /// address peer advertisements.
    participants: Mutex<Vec<UserId>>,
}

impl CapsuleBridge {
    pub fn new(
        identity: Arc<HostIdentity>,
        display_name: String,
        permissions: Arc<PermissionStore>,
        gate: Arc<CapabilityGate>,
        update_log: Arc<UpdateLog>,
        lifecycle: Arc<LifecycleManager>,
        coordinator: CoordinatorHandle,
    ) -> Self {
        Self {
            ctx: CommandCtx {
                identity,
                display_name,
                permissions,
                gate,
                update_log,
                lifecycle,
            },
            registry: RwLock::new(CommandRegistry::new()),
            coordinator,
            participants: Mutex::new(Vec::new()),
        }
    }

    /// Extend the command table (platform integrations register their own
    /// host operations here before the sandbox starts calling in).
    pub fn with_registry(&self, configure: impl FnOnce(&mut CommandRegistry)) {
        if let Ok(mut registry) = self.registry.write() {
            configure(&mut registry);
        }
    }

    // -- lifecycle -----------------------------------------------------------

    /// Open an instance, silently preempting whatever was open, and tear
    /// down the preempted instance's transient state.
    pub async fn open_instance(&self, instance: MiniAppInstance, participants: Vec<UserId>) {
        if let Ok(mut guard) = self.participants.lock() {
            *guard = participants;
        }
        if let Some(preempted) = self.ctx.lifecycle.open(instance) {
            self.teardown(&preempted.instance_id).await;
        }
    }

    /// Close an instance. A stale close for anything but the currently open
    /// instance is a no-op, not an error.
    pub async fn close_instance(&self, instance_id: &InstanceId) -> bool {
        let closed = self.ctx.lifecycle.close(instance_id);
        if closed {
            self.teardown(instance_id).await;
        }
        closed
    }

    pub fn is_instance_open(&self) -> bool {
        self.ctx.lifecycle.is_instance_open()
    }

    pub fn current_instance_id(&self) -> Option<InstanceId> {
        self.ctx.lifecycle.current_instance_id()
    }

    /// Release transient per-instance state: the gate's cached snapshot and
    /// any live realtime membership. Permission grants stay; consent
    /// survives re-opens. Idempotent.
    async fn teardown(&self, instance_id: &InstanceId) {
        self.ctx.gate.invalidate(instance_id);
        self.coordinator.leave(instance_id.clone()).await;
        debug!(instance = %instance_id.short(), "Tore down transient instance state");
    }

    fn is_current(&self, instance_id: &InstanceId) -> bool {
        self.ctx.lifecycle.current_instance_id().as_ref() == Some(instance_id)
    }

    // -- sandbox-facing operations -------------------------------------------

    /// Generic command dispatch. Always resolves to a JSON value; failures
    /// come back as `{error}` objects so the sandbox is never left in an
    /// unresolved call state.
    pub async fn invoke_command(&self, instance: &InstanceId, command: &str, args: Value) -> Value {
        if !self.is_current(instance) {
            // Calls racing a preemptive open resolve to a failed result
            // rather than completing against stale state.
            return error_json("instance not open");
        }

        let result = match self.registry.read() {
            Ok(registry) => registry.dispatch(&self.ctx, instance, command, args),
            Err(_) => Err(CommandError::Failed("command registry unavailable".into())),
        };

        let response = match result {
            Ok(value) => value,
            Err(e @ CommandError::Unknown(_)) => {
                debug!(command, "Unknown command from sandbox");
                error_json(e.to_string())
            }
            Err(e) => error_json(e.to_string()),
        };

        // A handler may have driven a lifecycle transition (app.close);
        // finish the teardown the lifecycle manager cannot do itself.
        if !self.is_current(instance) {
            self.teardown(instance).await;
        }

        response
    }

    /// Append a state update on behalf of the sandbox. Synchronously
    /// acknowledged either way.
    pub fn send_update(&self, instance: &InstanceId, payload: Value, description: &str) -> Value {
        if !self.is_current(instance) {
            return error_json("instance not open");
        }
        match self.ctx.update_log.append(instance, payload, description) {
            Ok(serial) => json!({ "ok": true, "serial": serial }),
            Err(e) => error_json(e.to_string()),
        }
    }

    /// Poll for updates past the caller's cursor. Always an array, never
    /// null: "nothing new" and "internal error" look identical to the
    /// caller, and repeated polling self-corrects.
    pub fn get_updates(&self, instance: &InstanceId, last_known_serial: u64) -> Value {
        if !self.is_current(instance) {
            return Value::Array(Vec::new());
        }
        match self.ctx.update_log.get_since(instance, last_known_serial) {
            Ok(records) => serde_json::to_value(records).unwrap_or_else(|_| Value::Array(Vec::new())),
            Err(e) => {
                warn!(instance = %instance.short(), error = %e, "Update poll failed");
                Value::Array(Vec::new())
            }
        }
    }

    /// Join the instance's realtime channel; `None` when no coordinator or
    /// transport is available.
    pub async fn join_realtime_channel(&self, instance: &InstanceId) -> Option<TopicId> {
        if !self.is_current(instance) {
            return None;
        }
        let topic_hint = self
            .ctx
            .lifecycle
            .current_instance()
            .and_then(|i| i.topic_hint);
        let participants = self
            .participants
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default();

        self.coordinator
            .join(instance.clone(), topic_hint, participants)
            .await
    }

    /// Publish an opaque frame to the channel's peers.
    ///
    /// Frames over the 128 000-byte ceiling are dropped before transmission
    /// and only logged; the ack still reads ok, matching peer
    /// implementations that rely on the silent-drop behavior.
    pub async fn send_realtime_data(&self, instance: &InstanceId, data: Vec<u8>) -> Value {
        if !self.is_current(instance) {
            return error_json("instance not open");
        }
        if data.len() > MAX_REALTIME_FRAME_SIZE {
            warn!(
                instance = %instance.short(),
                len = data.len(),
                max = MAX_REALTIME_FRAME_SIZE,
                "Dropping oversized realtime payload"
            );
            return json!({ "ok": true });
        }
        match self.coordinator.send_frame(instance.clone(), data).await {
            Ok(()) => json!({ "ok": true }),
            Err(e) => error_json(e.to_string()),
        }
    }

    /// Leave the realtime channel. Idempotent if already left.
    pub async fn leave_realtime_channel(&self, instance: &InstanceId) {
        self.coordinator.leave(instance.clone()).await;
    }

    /// Comma-joined names of the instance's granted capabilities, for the
    /// sandbox's own capability-check wrappers.
    pub fn get_granted_permissions(&self, instance: &InstanceId) -> String {
        match self.ctx.permissions.all_granted(instance) {
            Ok(granted) => {
                let mut names: Vec<&str> = granted.iter().map(|c| c.as_str()).collect();
                names.sort_unstable();
                names.join(",")
            }
            Err(e) => {
                warn!(instance = %instance.short(), error = %e, "Grant query failed");
                String::new()
            }
        }
    }

    /// Gate query used before sensitive operations. Fail closed.
    pub fn check_permission(&self, instance: &InstanceId, capability: Capability) -> bool {
        self.ctx.gate.check_permission(instance, capability)
    }

    /// Static identity info; no per-instance state.
    pub fn get_self_identity(&self) -> Value {
        json!({
            "address": self.ctx.identity.user_id().to_hex(),
            "displayName": self.ctx.display_name,
        })
    }
}
