/// Ed25519 public key size in bytes
pub const PUBKEY_SIZE: usize = 32;

/// Realtime topic identifier size in bytes
pub const TOPIC_SIZE: usize = 32;

/// Hard ceiling on a single realtime data frame, send and receive side.
/// Peer implementations enforce the same limit, so this is a wire constant.
pub const MAX_REALTIME_FRAME_SIZE: usize = 128_000;

/// Longest a peer advertisement may claim to be valid (5 minutes)
pub const ADVERT_TTL_SECS: i64 = 300;

/// Re-advertisement cadence while a realtime channel is active
pub const ADVERT_REFRESH_MIN_SECS: u64 = 120;
pub const ADVERT_REFRESH_MAX_SECS: u64 = 180;

/// Longest a typing announcement may claim to be valid (30 seconds)
pub const TYPING_TTL_SECS: i64 = 30;

/// Fixed content marker carried by a typing announcement
pub const TYPING_MARKER: &str = "composing";

/// How long the capability gate may serve a cached grant snapshot
pub const PERMISSION_CACHE_TTL_SECS: u64 = 5;

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_INSTANCE_ID: &str = "capsule-instance-id-v1";
