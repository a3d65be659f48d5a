//! # capsule-shared
//!
//! Domain types shared by every crate in the mini-app host: instance and
//! topic identifiers, the capability enum, the host identity, and the
//! control-event wire format (peer advertisements, typing announcements)
//! carried over the encrypted messaging transport.

pub mod announce;
pub mod constants;
pub mod identity;
pub mod types;

mod error;

pub use announce::{ControlEvent, PeerAdvertisement, SignedAdvertisement, TypingAnnouncement};
pub use error::{IdentityError, ParseIdError};
pub use identity::HostIdentity;
pub use types::{
    Capability, ConversationId, InstanceId, MessageId, MiniAppInstance, PackageRef, TopicId,
    UserId,
};
