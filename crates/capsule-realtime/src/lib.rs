// Realtime channel coordination for mini-app instances: topic identity,
// peer advertisement, and relay of gossip frames back into the sandbox.

pub mod coordinator;
pub mod transport;
pub mod typing;

mod error;

pub use coordinator::{spawn_coordinator, ChannelPhase, CoordinatorChannels, CoordinatorHandle};
pub use error::CoordinatorError;
pub use transport::{ControlPublish, GossipCommand, GossipInbound, RealtimeFrame};
pub use typing::TypingTracker;
