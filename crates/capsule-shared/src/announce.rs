//! Control events carried over the encrypted messaging transport.
//!
//! Both event kinds follow the same short-expiry announcement pattern: the
//! transport is store-and-forward and cannot garbage-collect privacy-wrapped
//! messages server-side, so every record carries a client-honored expiry and
//! senders refresh while the state remains true.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{ADVERT_TTL_SECS, TYPING_MARKER, TYPING_TTL_SECS};
use crate::error::IdentityError;
use crate::identity::{verify_signature, HostIdentity};
use crate::types::{TopicId, UserId};

/// Announcement of a device's reachability for one realtime topic.
///
/// Ephemeral: never persisted past `expires_at`, re-broadcast every few
/// minutes while the sender keeps the channel active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerAdvertisement {
    /// The realtime topic the sender has joined.
    pub topic: TopicId,
    /// Text-encoded routing descriptor (multiaddr) the gossip transport can dial.
    pub node_addr: String,
    /// The advertising device's public key.
    pub sender: UserId,
    /// Conversation participants this advertisement is addressed to.
    pub receivers: Vec<UserId>,
    /// Client-honored validity limit, at most 5 minutes from creation.
    pub expires_at: DateTime<Utc>,
}

impl PeerAdvertisement {
    /// Build an advertisement expiring `ADVERT_TTL_SECS` from now.
    pub fn new(topic: TopicId, node_addr: String, sender: UserId, receivers: Vec<UserId>) -> Self {
        Self {
            topic,
            node_addr,
            sender,
            receivers,
            expires_at: Utc::now() + Duration::seconds(ADVERT_TTL_SECS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Canonical byte string covered by the envelope signature.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + self.node_addr.len() + 32 + 8);
        buf.extend_from_slice(&self.topic.0);
        buf.extend_from_slice(self.node_addr.as_bytes());
        buf.extend_from_slice(&self.sender.0);
        buf.extend_from_slice(&self.expires_at.timestamp_millis().to_le_bytes());
        buf
    }
}

/// A [`PeerAdvertisement`] plus the sender's detached Ed25519 signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedAdvertisement {
    pub advert: PeerAdvertisement,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

impl SignedAdvertisement {
    pub fn sign(advert: PeerAdvertisement, identity: &HostIdentity) -> Self {
        let signature = identity.sign(&advert.signing_bytes()).to_vec();
        Self { advert, signature }
    }

    /// Check the signature against the advertisement's claimed sender.
    pub fn verify(&self) -> Result<(), IdentityError> {
        let signature = ed25519_dalek::Signature::from_slice(&self.signature)
            .map_err(|_| IdentityError::InvalidSignature)?;
        verify_signature(&self.advert.sender.0, &self.advert.signing_bytes(), &signature)
    }
}

/// Short-lived "currently composing" presence announcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingAnnouncement {
    pub sender: UserId,
    pub sender_display_name: String,
    pub receivers: Vec<UserId>,
    /// Fixed marker; anything else is discarded on receipt.
    pub marker: String,
    /// At most 30 seconds from creation.
    pub expires_at: DateTime<Utc>,
}

impl TypingAnnouncement {
    pub fn new(sender: UserId, sender_display_name: String, receivers: Vec<UserId>) -> Self {
        Self {
            sender,
            sender_display_name,
            receivers,
            marker: TYPING_MARKER.to_string(),
            expires_at: Utc::now() + Duration::seconds(TYPING_TTL_SECS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// All control events exchanged between devices over the messaging transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ControlEvent {
    /// Signed reachability announcement for a realtime topic
    PeerAdvert(SignedAdvertisement),

    /// Ephemeral typing-state announcement
    Typing(TypingAnnouncement),
}

impl ControlEvent {
    /// Serialize to the text wire format (JSON)
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from the text wire format
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
