//! # capsule-bridge
//!
//! Wires the host components together and exposes the capability bridge
//! the sandboxed mini-app content calls into. The bridge crate owns the
//! channel endpoints handed to the platform collaborators: the gossip
//! transport, the encrypted messaging transport, the lifecycle/UI layer,
//! and the sandbox's own event listener.

pub mod bridge;
pub mod commands;
pub mod events;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use libp2p::Multiaddr;
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use capsule_host::{
    CapabilityGate, LifecycleEvent, LifecycleManager, PermissionStore, UpdateLog,
};
use capsule_realtime::{
    spawn_coordinator, ControlPublish, CoordinatorChannels, GossipCommand, GossipInbound,
    RealtimeFrame,
};
use capsule_shared::{ControlEvent, HostIdentity, TypingAnnouncement};

pub use bridge::CapsuleBridge;
pub use commands::{CommandCtx, CommandError, CommandRegistry};
pub use events::SandboxEvent;

/// Install the default tracing subscriber (env-filter overridable).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("capsule_bridge=debug,capsule_realtime=debug,capsule_host=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Host-level configuration for one runtime.
pub struct RuntimeConfig {
    /// Shown to mini-apps via `getSelfIdentity`.
    pub display_name: String,
    /// This device's routing descriptor, advertised to peers.
    pub node_addr: Multiaddr,
}

/// Channel endpoints for the platform collaborators.
pub struct RuntimeChannels {
    /// Commands the gossip transport must execute (subscribe/publish/dial).
    pub gossip_cmd_rx: mpsc::Receiver<GossipCommand>,
    /// Feed of inbound gossip deliveries into the coordinator.
    pub gossip_in_tx: mpsc::Sender<GossipInbound>,
    /// Addressed control events for the messaging transport to deliver.
    pub control_pub_rx: mpsc::Receiver<ControlPublish>,
    /// Feed of inbound control events from the messaging transport.
    pub control_in_tx: mpsc::Sender<ControlEvent>,
    /// Open/close notifications for the lifecycle/UI collaborator.
    pub lifecycle_rx: mpsc::Receiver<LifecycleEvent>,
    /// Events bound for the sandbox's update-listener callback.
    pub sandbox_rx: mpsc::Receiver<SandboxEvent>,
    /// Typing announcements split off the control feed.
    pub typing_rx: mpsc::Receiver<TypingAnnouncement>,
}

/// Assemble the whole subsystem and spawn its background tasks.
///
/// Must run inside a tokio runtime. Returns the bridge the sandbox layer
/// calls into plus the channel endpoints for the collaborators.
pub fn start_runtime(
    identity: HostIdentity,
    config: RuntimeConfig,
) -> (Arc<CapsuleBridge>, RuntimeChannels) {
    let identity = Arc::new(identity);

    let permissions = Arc::new(PermissionStore::new());
    let gate = Arc::new(CapabilityGate::new(permissions.clone()));
    let update_log = Arc::new(UpdateLog::new());
    let (lifecycle, lifecycle_rx) = LifecycleManager::new();
    let lifecycle = Arc::new(lifecycle);

    let (gossip_tx, gossip_cmd_rx) = mpsc::channel(256);
    let (control_tx, control_pub_rx) = mpsc::channel(256);
    let (frame_tx, frame_rx) = mpsc::channel(256);
    let (control_in_tx, control_rx) = mpsc::channel(256);
    let (gossip_in_tx, gossip_rx) = mpsc::channel(256);
    let (typing_tx, typing_rx) = mpsc::channel(64);
    let (sandbox_tx, sandbox_rx) = mpsc::channel(256);

    let coordinator = spawn_coordinator(
        identity.clone(),
        config.node_addr,
        CoordinatorChannels {
            gossip_tx,
            control_tx,
            frame_tx,
            typing_tx: Some(typing_tx),
            control_rx,
            gossip_rx,
        },
    );

    spawn_frame_pump(frame_rx, sandbox_tx);

    let bridge = Arc::new(CapsuleBridge::new(
        identity,
        config.display_name,
        permissions,
        gate,
        update_log,
        lifecycle,
        coordinator,
    ));

    (
        bridge,
        RuntimeChannels {
            gossip_cmd_rx,
            gossip_in_tx,
            control_pub_rx,
            control_in_tx,
            lifecycle_rx,
            sandbox_rx,
            typing_rx,
        },
    )
}

/// Forward coordinator frames to the sandbox listener as base64 payloads.
fn spawn_frame_pump(
    mut frame_rx: mpsc::Receiver<RealtimeFrame>,
    sandbox_tx: mpsc::Sender<SandboxEvent>,
) {
    tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let payload = events::RealtimeFramePayload {
                instance_id: frame.instance_id.to_string(),
                data: BASE64.encode(&frame.data),
            };
            if sandbox_tx
                .send(SandboxEvent::RealtimeFrame(payload))
                .await
                .is_err()
            {
                warn!("Sandbox listener gone, stopping frame pump");
                break;
            }
        }
    });
}
