use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::constants::{KDF_CONTEXT_INSTANCE_ID, PUBKEY_SIZE, TOPIC_SIZE};
use crate::error::ParseIdError;

fn fixed_from_hex<const N: usize>(s: &str) -> Result<[u8; N], ParseIdError> {
    let bytes = hex::decode(s)?;
    if bytes.len() != N {
        return Err(ParseIdError::InvalidLength {
            expected: N,
            got: bytes.len(),
        });
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

// User identity = Ed25519 public key (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub [u8; PUBKEY_SIZE]);

impl UserId {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, ParseIdError> {
        fixed_from_hex(s).map(Self)
    }

    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// Text-encoded on the wire so control events stay readable JSON.
impl Serialize for UserId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Identifier scoping one realtime gossip channel to exactly one mini-app
/// instance. Generated once (by the attachment's creator or the first
/// joiner) and immutable for the instance's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TopicId(pub [u8; TOPIC_SIZE]);

impl TopicId {
    /// Freshly generate a random topic (joiner-generates fallback).
    pub fn generate() -> Self {
        Self(rand::random())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, ParseIdError> {
        fixed_from_hex(s).map(Self)
    }

    /// The gossip subscription string for this topic.
    pub fn to_topic(&self) -> String {
        format!("capsule:{}", self.to_hex())
    }

    /// Parse a gossip subscription string back into a topic id.
    pub fn from_topic(topic: &str) -> Option<Self> {
        topic.strip_prefix("capsule:").and_then(|h| Self::from_hex(h).ok())
    }
}

impl std::fmt::Display for TopicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for TopicId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TopicId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Content-addressed reference to a mini-app's bundled assets (BLAKE3 hash).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackageRef(pub [u8; 32]);

impl PackageRef {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, ParseIdError> {
        fixed_from_hex(s).map(Self)
    }
}

impl Serialize for PackageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PackageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier for one running mini-app inside one conversation.
///
/// Stable across re-opens: derived with a BLAKE3 KDF over the conversation,
/// the originating message, and the package hash, so the same attachment
/// always maps to the same instance (and thus the same permission scope).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn derive(
        conversation: &ConversationId,
        message: &MessageId,
        package: &PackageRef,
    ) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_INSTANCE_ID);
        hasher.update(conversation.0.as_bytes());
        hasher.update(message.0.as_bytes());
        hasher.update(&package.0);
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> String {
        self.0[..8].to_string()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A discrete sensitive operation gated by an explicit user grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Microphone,
    Camera,
    DisplayCapture,
    Geolocation,
    ClipboardRead,
    ClipboardWrite,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Microphone,
        Capability::Camera,
        Capability::DisplayCapture,
        Capability::Geolocation,
        Capability::ClipboardRead,
        Capability::ClipboardWrite,
    ];

    /// The stable name used on the bridge surface.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Microphone => "microphone",
            Capability::Camera => "camera",
            Capability::DisplayCapture => "display-capture",
            Capability::Geolocation => "geolocation",
            Capability::ClipboardRead => "clipboard-read",
            Capability::ClipboardWrite => "clipboard-write",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or(())
    }
}

/// One mini-app attachment as opened inside a conversation.
///
/// Grant state lives in the permission store and the realtime topic in the
/// coordinator; this struct carries only the identity of the instance plus
/// the attachment-embedded topic hint, if the creator supplied one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiniAppInstance {
    pub instance_id: InstanceId,
    pub package: PackageRef,
    pub conversation_id: ConversationId,
    pub originating_message_id: MessageId,
    /// Topic embedded in the attachment metadata so all participants
    /// converge without negotiation. `None` for legacy attachments.
    pub topic_hint: Option<TopicId>,
}

impl MiniAppInstance {
    pub fn new(
        package: PackageRef,
        conversation_id: ConversationId,
        originating_message_id: MessageId,
        topic_hint: Option<TopicId>,
    ) -> Self {
        let instance_id = InstanceId::derive(&conversation_id, &originating_message_id, &package);
        Self {
            instance_id,
            package,
            conversation_id,
            originating_message_id,
            topic_hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_stable() {
        let conv = ConversationId::new();
        let msg = MessageId::new();
        let pkg = PackageRef([7u8; 32]);

        let a = InstanceId::derive(&conv, &msg, &pkg);
        let b = InstanceId::derive(&conv, &msg, &pkg);
        assert_eq!(a, b);

        let other = InstanceId::derive(&conv, &MessageId::new(), &pkg);
        assert_ne!(a, other);
    }

    #[test]
    fn test_topic_roundtrip() {
        let topic = TopicId::generate();
        let parsed = TopicId::from_hex(&topic.to_hex()).unwrap();
        assert_eq!(topic, parsed);

        let sub = topic.to_topic();
        assert!(sub.starts_with("capsule:"));
        assert_eq!(TopicId::from_topic(&sub), Some(topic));
        assert_eq!(TopicId::from_topic("channel:abcd"), None);
    }

    #[test]
    fn test_topic_hex_length_checked() {
        assert!(TopicId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_capability_names() {
        for cap in Capability::ALL {
            let parsed: Capability = cap.as_str().parse().unwrap();
            assert_eq!(parsed, cap);
        }
        assert!("telepathy".parse::<Capability>().is_err());
    }

    #[test]
    fn test_topic_serde_is_hex_text() {
        let topic = TopicId([0xab; 32]);
        let json = serde_json::to_string(&topic).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
    }
}
