//! Event payloads delivered to the sandbox's listener callback. Lifecycle
//! notifications for the UI collaborator travel separately as
//! `capsule_host::LifecycleEvent`.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeFramePayload {
    pub instance_id: String,
    /// Opaque binary frame, base64 so it survives the JSON boundary.
    pub data: String,
}

/// Events the host pushes into the sandbox's update listener.
#[derive(Debug, Clone)]
pub enum SandboxEvent {
    RealtimeFrame(RealtimeFramePayload),
}
