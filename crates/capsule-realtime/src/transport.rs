//! Channel types at the boundary to the two external transports.
//!
//! The gossip transport (moves realtime bytes between joined peers) and the
//! encrypted messaging transport (carries addressed control events) are
//! platform collaborators. The coordinator speaks to both exclusively
//! through these typed mpsc messages.

use libp2p::{Multiaddr, PeerId};

use capsule_shared::{ControlEvent, InstanceId, UserId};

/// Commands sent *into* the gossip transport.
#[derive(Debug, Clone)]
pub enum GossipCommand {
    /// Subscribe to a topic string (`capsule:<hex>`).
    Subscribe(String),
    /// Drop membership of a topic.
    Unsubscribe(String),
    /// Publish an opaque frame on a topic.
    Publish { topic: String, data: Vec<u8> },
    /// Dial an advertised peer so the mesh can form.
    Dial(Multiaddr),
}

/// Inbound delivery *from* the gossip transport.
#[derive(Debug, Clone)]
pub struct GossipInbound {
    pub source: Option<PeerId>,
    pub topic: String,
    pub data: Vec<u8>,
}

/// An addressed control event for the messaging transport to privacy-wrap
/// and deliver to each receiver.
#[derive(Debug, Clone)]
pub struct ControlPublish {
    pub receivers: Vec<UserId>,
    pub event: ControlEvent,
}

/// An opaque binary frame bound for the sandbox of one instance.
#[derive(Debug, Clone)]
pub struct RealtimeFrame {
    pub instance_id: InstanceId,
    pub data: Vec<u8>,
}
