//! Named host operations reachable through `invoke_command`.
//!
//! Dispatch is an explicit name-to-handler table validated at the boundary:
//! unknown names produce a structured result, never a dynamic lookup
//! failure. A handler that needs a sensitive capability declares it at
//! registration and the gate is consulted before the handler runs.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use capsule_host::{CapabilityGate, LifecycleManager, PermissionStore, UpdateLog};
use capsule_shared::{Capability, HostIdentity, InstanceId};

/// Failures a command handler can produce. All of them are converted to a
/// structured `{error}` object before crossing into the sandbox.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Capability {0} denied")]
    Denied(Capability),

    #[error("{0}")]
    Failed(String),
}

/// Shared host state handed to every handler.
pub struct CommandCtx {
    pub identity: Arc<HostIdentity>,
    pub display_name: String,
    pub permissions: Arc<PermissionStore>,
    pub gate: Arc<CapabilityGate>,
    pub update_log: Arc<UpdateLog>,
    pub lifecycle: Arc<LifecycleManager>,
}

pub type CommandHandler =
    Arc<dyn Fn(&CommandCtx, &InstanceId, Value) -> Result<Value, CommandError> + Send + Sync>;

struct RegisteredCommand {
    requires: Option<Capability>,
    handler: CommandHandler,
}

/// The name-to-handler mapping table behind `invoke_command`.
pub struct CommandRegistry {
    handlers: HashMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    /// Registry pre-populated with the built-in host operations.
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        registry.register_builtins();
        registry
    }

    /// Register an ungated command.
    pub fn register(&mut self, name: &str, handler: CommandHandler) {
        self.handlers.insert(
            name.to_string(),
            RegisteredCommand {
                requires: None,
                handler,
            },
        );
    }

    /// Register a command that requires a granted capability to run.
    pub fn register_gated(&mut self, name: &str, capability: Capability, handler: CommandHandler) {
        self.handlers.insert(
            name.to_string(),
            RegisteredCommand {
                requires: Some(capability),
                handler,
            },
        );
    }

    /// Route one command. The gate is checked before any gated handler runs;
    /// a denial is a permission-style rejection, never a crash.
    pub fn dispatch(
        &self,
        ctx: &CommandCtx,
        instance: &InstanceId,
        name: &str,
        args: Value,
    ) -> Result<Value, CommandError> {
        let command = self
            .handlers
            .get(name)
            .ok_or_else(|| CommandError::Unknown(name.to_string()))?;

        if let Some(capability) = command.requires {
            if !ctx.gate.check_permission(instance, capability) {
                debug!(
                    instance = %instance.short(),
                    command = name,
                    capability = %capability,
                    "Gated command denied"
                );
                return Err(CommandError::Denied(capability));
            }
        }

        (command.handler)(ctx, instance, args)
    }

    fn register_builtins(&mut self) {
        self.register(
            "self.identity",
            Arc::new(|ctx, _instance, _args| {
                Ok(json!({
                    "address": ctx.identity.user_id().to_hex(),
                    "displayName": ctx.display_name,
                }))
            }),
        );

        self.register(
            "permissions.granted",
            Arc::new(|ctx, instance, _args| {
                let granted = ctx
                    .permissions
                    .all_granted(instance)
                    .map_err(|e| CommandError::Failed(e.to_string()))?;
                let mut names: Vec<&str> = granted.iter().map(|c| c.as_str()).collect();
                names.sort_unstable();
                Ok(json!({ "granted": names.join(",") }))
            }),
        );

        self.register(
            "updates.head",
            Arc::new(|ctx, instance, _args| {
                let head = ctx
                    .update_log
                    .head_serial(instance)
                    .map_err(|e| CommandError::Failed(e.to_string()))?;
                Ok(json!({ "serial": head }))
            }),
        );

        // The sandbox asking to close itself. The bridge notices the
        // lifecycle transition after dispatch and runs realtime teardown.
        self.register(
            "app.close",
            Arc::new(|ctx, instance, _args| {
                let closed = ctx.lifecycle.close(instance);
                Ok(json!({ "closed": closed }))
            }),
        );
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
