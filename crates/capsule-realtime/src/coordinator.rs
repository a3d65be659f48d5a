//! Per-instance realtime channel coordination.
//!
//! The coordinator runs in a dedicated tokio task. External code talks to
//! it through typed command channels; the gossip and messaging transports
//! hang off their own mpsc pairs. For every joined instance it owns the
//! topic identity, publishes signed peer advertisements on a 120–180 s
//! jittered cadence, folds inbound advertisements into the topic's peer
//! set, and relays inbound gossip frames back toward the sandbox.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use libp2p::Multiaddr;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use capsule_shared::constants::{
    ADVERT_REFRESH_MAX_SECS, ADVERT_REFRESH_MIN_SECS, MAX_REALTIME_FRAME_SIZE,
};
use capsule_shared::{
    ControlEvent, HostIdentity, InstanceId, PeerAdvertisement, SignedAdvertisement, TopicId,
    TypingAnnouncement, UserId,
};

use crate::error::CoordinatorError;
use crate::transport::{ControlPublish, GossipCommand, GossipInbound, RealtimeFrame};

/// Where one instance's channel sits in
/// `Inactive → Joining → Active → Leaving → Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    Inactive,
    Joining,
    Active,
    Leaving,
}

#[derive(Debug)]
struct ChannelState {
    topic: TopicId,
    phase: ChannelPhase,
    participants: Vec<UserId>,
    /// Advertised node addresses the gossip transport has been asked to dial.
    peers: HashSet<Multiaddr>,
    next_advert_at: Instant,
}

/// Outcome of folding one inbound advertisement into the table.
#[derive(Debug)]
enum AdvertOutcome {
    /// Address accepted for this instance's peer set; dial it.
    Dial(InstanceId, Multiaddr),
    /// Expired, mismatched, unverifiable, or self-addressed. Dropped
    /// silently; not an error condition visible to anyone.
    Ignored(&'static str),
}

/// Channel bookkeeping, separated from the task loop so the advert and
/// topic-isolation rules are plain synchronous code.
#[derive(Debug, Default)]
struct ChannelTable {
    channels: HashMap<InstanceId, ChannelState>,
}

impl ChannelTable {
    /// Assign (or re-use) the topic for an instance and mark it joining.
    ///
    /// Topic policy: the attachment-embedded hint wins so all participants
    /// converge without negotiation; a fresh random id is the fallback for
    /// attachments without one. A re-join after leave keeps the original
    /// topic; the identifier is immutable for the instance's lifetime.
    fn join(
        &mut self,
        instance_id: InstanceId,
        topic_hint: Option<TopicId>,
        participants: Vec<UserId>,
    ) -> TopicId {
        if let Some(state) = self.channels.get_mut(&instance_id) {
            state.phase = ChannelPhase::Joining;
            state.participants = participants;
            return state.topic;
        }

        let topic = topic_hint.unwrap_or_else(TopicId::generate);
        self.channels.insert(
            instance_id,
            ChannelState {
                topic,
                phase: ChannelPhase::Joining,
                participants,
                peers: HashSet::new(),
                next_advert_at: Instant::now(),
            },
        );
        topic
    }

    fn activate(&mut self, instance_id: &InstanceId, next_advert_at: Instant) {
        if let Some(state) = self.channels.get_mut(instance_id) {
            state.phase = ChannelPhase::Active;
            state.next_advert_at = next_advert_at;
        }
    }

    /// Mark a channel inactive, clearing its peer set but keeping the topic
    /// so the same instance can re-join later.
    fn leave(&mut self, instance_id: &InstanceId) -> Option<TopicId> {
        let state = self.channels.get_mut(instance_id)?;
        if state.phase == ChannelPhase::Inactive {
            return None;
        }
        state.phase = ChannelPhase::Leaving;
        state.peers.clear();
        state.phase = ChannelPhase::Inactive;
        Some(state.topic)
    }

    fn active_topic(&self, instance_id: &InstanceId) -> Option<TopicId> {
        self.channels
            .get(instance_id)
            .filter(|s| s.phase == ChannelPhase::Active)
            .map(|s| s.topic)
    }

    /// The instance whose *active* channel owns this gossip topic string.
    fn instance_for_topic(&self, topic: &str) -> Option<InstanceId> {
        let topic_id = TopicId::from_topic(topic)?;
        self.channels
            .iter()
            .find(|(_, s)| s.phase == ChannelPhase::Active && s.topic == topic_id)
            .map(|(id, _)| id.clone())
    }

    /// Validate one inbound advertisement and fold it into the peer set.
    fn apply_advert(
        &mut self,
        signed: &SignedAdvertisement,
        own_id: &UserId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> AdvertOutcome {
        let advert = &signed.advert;

        if advert.is_expired(now) {
            return AdvertOutcome::Ignored("expired");
        }
        if &advert.sender == own_id {
            return AdvertOutcome::Ignored("own advertisement");
        }
        if signed.verify().is_err() {
            return AdvertOutcome::Ignored("bad signature");
        }

        let addr: Multiaddr = match advert.node_addr.parse() {
            Ok(a) => a,
            Err(_) => return AdvertOutcome::Ignored("unparseable node address"),
        };

        // Topic isolation: only an Active channel with this exact topic may
        // absorb the address. No cross-app or cross-conversation bleed.
        match self
            .channels
            .iter_mut()
            .find(|(_, s)| s.phase == ChannelPhase::Active && s.topic == advert.topic)
        {
            Some((id, state)) => {
                state.peers.insert(addr.clone());
                AdvertOutcome::Dial(id.clone(), addr)
            }
            None => AdvertOutcome::Ignored("no active channel for topic"),
        }
    }

    /// Channels whose re-advertisement deadline has passed.
    fn due_adverts(&mut self, now: Instant) -> Vec<(InstanceId, TopicId, Vec<UserId>)> {
        self.channels
            .iter()
            .filter(|(_, s)| s.phase == ChannelPhase::Active && s.next_advert_at <= now)
            .map(|(id, s)| (id.clone(), s.topic, s.participants.clone()))
            .collect()
    }

    fn peer_count(&self, instance_id: &InstanceId) -> usize {
        self.channels
            .get(instance_id)
            .map(|s| s.peers.len())
            .unwrap_or(0)
    }
}

/// Jittered delay until the next re-advertisement. The spread avoids a
/// thundering herd of refreshes hitting the relay at the same instant.
fn advert_refresh_delay() -> Duration {
    let secs = rand::thread_rng().gen_range(ADVERT_REFRESH_MIN_SECS..=ADVERT_REFRESH_MAX_SECS);
    Duration::from_secs(secs)
}

// ---------------------------------------------------------------------------
// Command / handle types
// ---------------------------------------------------------------------------

/// Commands sent *into* the coordinator task.
#[derive(Debug)]
enum CoordinatorCommand {
    Join {
        instance_id: InstanceId,
        topic_hint: Option<TopicId>,
        participants: Vec<UserId>,
        reply: oneshot::Sender<Option<TopicId>>,
    },
    Leave {
        instance_id: InstanceId,
    },
    SendFrame {
        instance_id: InstanceId,
        data: Vec<u8>,
    },
    Shutdown,
}

/// Cloneable handle for driving the coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    cmd_tx: mpsc::Sender<CoordinatorCommand>,
}

impl CoordinatorHandle {
    /// Join (or re-join) the realtime channel for an instance.
    ///
    /// Returns the topic the channel converged on, or `None` when the
    /// coordinator or gossip transport is unavailable.
    pub async fn join(
        &self,
        instance_id: InstanceId,
        topic_hint: Option<TopicId>,
        participants: Vec<UserId>,
    ) -> Option<TopicId> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(CoordinatorCommand::Join {
                instance_id,
                topic_hint,
                participants,
                reply,
            })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    /// Tear down topic membership. Idempotent if already left.
    pub async fn leave(&self, instance_id: InstanceId) {
        let _ = self
            .cmd_tx
            .send(CoordinatorCommand::Leave { instance_id })
            .await;
    }

    /// Publish an opaque frame on the instance's active topic.
    pub async fn send_frame(
        &self,
        instance_id: InstanceId,
        data: Vec<u8>,
    ) -> Result<(), CoordinatorError> {
        self.cmd_tx
            .send(CoordinatorCommand::SendFrame { instance_id, data })
            .await
            .map_err(|_| CoordinatorError::TransportUnavailable)
    }

    /// Gracefully stop the coordinator task.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(CoordinatorCommand::Shutdown).await;
    }
}

/// Transport endpoints the coordinator is wired to.
pub struct CoordinatorChannels {
    /// Commands consumed by the external gossip transport.
    pub gossip_tx: mpsc::Sender<GossipCommand>,
    /// Addressed control events for the messaging transport to deliver.
    pub control_tx: mpsc::Sender<ControlPublish>,
    /// Sandbox-bound realtime frames, drained by the bridge.
    pub frame_tx: mpsc::Sender<RealtimeFrame>,
    /// Typing announcements split off the control feed, if anyone listens.
    pub typing_tx: Option<mpsc::Sender<TypingAnnouncement>>,
    /// Inbound control events from the messaging transport.
    pub control_rx: mpsc::Receiver<ControlEvent>,
    /// Inbound gossip deliveries.
    pub gossip_rx: mpsc::Receiver<GossipInbound>,
}

/// Spawn the coordinator in a background tokio task.
///
/// `node_addr` is this device's routing descriptor as advertised to peers.
pub fn spawn_coordinator(
    identity: Arc<HostIdentity>,
    node_addr: Multiaddr,
    channels: CoordinatorChannels,
) -> CoordinatorHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(64);

    tokio::spawn(run_loop(identity, node_addr, channels, cmd_rx));

    CoordinatorHandle { cmd_tx }
}

async fn run_loop(
    identity: Arc<HostIdentity>,
    node_addr: Multiaddr,
    mut channels: CoordinatorChannels,
    mut cmd_rx: mpsc::Receiver<CoordinatorCommand>,
) {
    let mut table = ChannelTable::default();
    // Deadline sweep for re-advertisement; coarse on purpose.
    let mut tick = tokio::time::interval(Duration::from_secs(5));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!("Realtime coordinator started");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(CoordinatorCommand::Join { instance_id, topic_hint, participants, reply }) => {
                        let topic = table.join(instance_id.clone(), topic_hint, participants.clone());

                        let subscribed = channels
                            .gossip_tx
                            .send(GossipCommand::Subscribe(topic.to_topic()))
                            .await
                            .is_ok();

                        if !subscribed {
                            warn!(instance = %instance_id.short(), "Gossip transport gone, join failed");
                            table.leave(&instance_id);
                            let _ = reply.send(None);
                            continue;
                        }

                        table.activate(&instance_id, Instant::now() + advert_refresh_delay());
                        publish_advert(&identity, &node_addr, &channels.control_tx, topic, &participants).await;

                        info!(
                            instance = %instance_id.short(),
                            topic = %topic,
                            "Joined realtime channel"
                        );
                        let _ = reply.send(Some(topic));
                    }

                    Some(CoordinatorCommand::Leave { instance_id }) => {
                        if let Some(topic) = table.leave(&instance_id) {
                            let _ = channels
                                .gossip_tx
                                .send(GossipCommand::Unsubscribe(topic.to_topic()))
                                .await;
                            info!(instance = %instance_id.short(), topic = %topic, "Left realtime channel");
                        }
                    }

                    Some(CoordinatorCommand::SendFrame { instance_id, data }) => {
                        match table.active_topic(&instance_id) {
                            Some(topic) => {
                                let _ = channels
                                    .gossip_tx
                                    .send(GossipCommand::Publish {
                                        topic: topic.to_topic(),
                                        data,
                                    })
                                    .await;
                            }
                            None => {
                                debug!(
                                    instance = %instance_id.short(),
                                    "Dropping frame for inactive channel"
                                );
                            }
                        }
                    }

                    Some(CoordinatorCommand::Shutdown) | None => {
                        info!("Coordinator shutdown");
                        break;
                    }
                }
            }

            event = channels.control_rx.recv() => {
                match event {
                    Some(ControlEvent::PeerAdvert(signed)) => {
                        match table.apply_advert(&signed, &identity.user_id(), chrono::Utc::now()) {
                            AdvertOutcome::Dial(instance_id, addr) => {
                                debug!(
                                    instance = %instance_id.short(),
                                    addr = %addr,
                                    peers = table.peer_count(&instance_id),
                                    "Peer advertisement accepted"
                                );
                                let _ = channels.gossip_tx.send(GossipCommand::Dial(addr)).await;
                            }
                            AdvertOutcome::Ignored(reason) => {
                                debug!(reason, "Discarded peer advertisement");
                            }
                        }
                    }
                    Some(ControlEvent::Typing(announcement)) => {
                        if let Some(ref typing_tx) = channels.typing_tx {
                            let _ = typing_tx.send(announcement).await;
                        }
                    }
                    None => {
                        info!("Control feed closed, shutting down coordinator");
                        break;
                    }
                }
            }

            inbound = channels.gossip_rx.recv() => {
                match inbound {
                    Some(GossipInbound { topic, data, source }) => {
                        if data.len() > MAX_REALTIME_FRAME_SIZE {
                            warn!(
                                topic = %topic,
                                len = data.len(),
                                "Dropping oversized inbound frame"
                            );
                            continue;
                        }
                        match table.instance_for_topic(&topic) {
                            Some(instance_id) => {
                                debug!(
                                    instance = %instance_id.short(),
                                    source = ?source,
                                    len = data.len(),
                                    "Relaying frame to sandbox"
                                );
                                let _ = channels
                                    .frame_tx
                                    .send(RealtimeFrame { instance_id, data })
                                    .await;
                            }
                            None => {
                                debug!(topic = %topic, "Frame for non-active topic dropped");
                            }
                        }
                    }
                    None => {
                        info!("Gossip feed closed, shutting down coordinator");
                        break;
                    }
                }
            }

            _ = tick.tick() => {
                let now = Instant::now();
                for (instance_id, topic, participants) in table.due_adverts(now) {
                    publish_advert(&identity, &node_addr, &channels.control_tx, topic, &participants).await;
                    table.activate(&instance_id, now + advert_refresh_delay());
                    debug!(instance = %instance_id.short(), "Re-advertised channel");
                }
            }
        }
    }

    info!("Realtime coordinator terminated");
}

/// Build, sign, and hand one advertisement to the messaging transport.
/// Delivery failure is not surfaced: the next refresh retries.
async fn publish_advert(
    identity: &HostIdentity,
    node_addr: &Multiaddr,
    control_tx: &mpsc::Sender<ControlPublish>,
    topic: TopicId,
    participants: &[UserId],
) {
    let advert = PeerAdvertisement::new(
        topic,
        node_addr.to_string(),
        identity.user_id(),
        participants.to_vec(),
    );
    let signed = SignedAdvertisement::sign(advert, identity);

    if control_tx
        .send(ControlPublish {
            receivers: participants.to_vec(),
            event: ControlEvent::PeerAdvert(signed),
        })
        .await
        .is_err()
    {
        warn!(topic = %topic, "Messaging transport gone, advert not delivered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsule_shared::{ConversationId, MessageId, PackageRef};
    use chrono::Utc;

    fn test_instance(seed: u8) -> InstanceId {
        InstanceId::derive(
            &ConversationId::new(),
            &MessageId::new(),
            &PackageRef([seed; 32]),
        )
    }

    fn signed_advert(identity: &HostIdentity, topic: TopicId, addr: &str) -> SignedAdvertisement {
        SignedAdvertisement::sign(
            PeerAdvertisement::new(topic, addr.to_string(), identity.user_id(), vec![]),
            identity,
        )
    }

    #[test]
    fn test_topic_hint_wins_and_survives_rejoin() {
        let mut table = ChannelTable::default();
        let id = test_instance(1);
        let hint = TopicId::generate();

        assert_eq!(table.join(id.clone(), Some(hint), vec![]), hint);
        table.activate(&id, Instant::now());
        table.leave(&id);
        assert!(table.active_topic(&id).is_none());

        // Re-join converges on the original topic even without the hint.
        assert_eq!(table.join(id, None, vec![]), hint);
    }

    #[test]
    fn test_fresh_topic_without_hint() {
        let mut table = ChannelTable::default();
        let a = table.join(test_instance(2), None, vec![]);
        let b = table.join(test_instance(3), None, vec![]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_expired_advert_never_joins_peer_set() {
        let mut table = ChannelTable::default();
        let me = HostIdentity::generate();
        let peer = HostIdentity::generate();
        let id = test_instance(4);
        let topic = table.join(id.clone(), None, vec![]);
        table.activate(&id, Instant::now());

        let mut advert =
            PeerAdvertisement::new(topic, "/ip4/10.1.1.1/udp/4001/quic-v1".into(), peer.user_id(), vec![]);
        advert.expires_at = Utc::now() - chrono::Duration::seconds(1);
        let signed = SignedAdvertisement::sign(advert, &peer);

        assert!(matches!(
            table.apply_advert(&signed, &me.user_id(), Utc::now()),
            AdvertOutcome::Ignored("expired")
        ));
        assert_eq!(table.peer_count(&id), 0);
    }

    #[test]
    fn test_topic_isolation() {
        let mut table = ChannelTable::default();
        let me = HostIdentity::generate();
        let peer = HostIdentity::generate();

        let app1 = test_instance(5);
        let t1 = table.join(app1.clone(), None, vec![]);
        table.activate(&app1, Instant::now());

        // Advert for the joined topic T1: accepted, N1 dialled.
        let accepted = signed_advert(&peer, t1, "/ip4/10.0.0.1/udp/4001/quic-v1");
        match table.apply_advert(&accepted, &me.user_id(), Utc::now()) {
            AdvertOutcome::Dial(id, addr) => {
                assert_eq!(id, app1);
                assert_eq!(addr.to_string(), "/ip4/10.0.0.1/udp/4001/quic-v1");
            }
            other => panic!("Expected dial, got {other:?}"),
        }
        assert_eq!(table.peer_count(&app1), 1);

        // Advert for an unrelated, non-joined topic T2: ignored.
        let stray = signed_advert(&peer, TopicId::generate(), "/ip4/10.0.0.2/udp/4001/quic-v1");
        assert!(matches!(
            table.apply_advert(&stray, &me.user_id(), Utc::now()),
            AdvertOutcome::Ignored("no active channel for topic")
        ));
        assert_eq!(table.peer_count(&app1), 1);
    }

    #[test]
    fn test_duplicate_advert_is_harmless() {
        let mut table = ChannelTable::default();
        let me = HostIdentity::generate();
        let peer = HostIdentity::generate();
        let id = test_instance(6);
        let topic = table.join(id.clone(), None, vec![]);
        table.activate(&id, Instant::now());

        let signed = signed_advert(&peer, topic, "/ip4/10.0.0.9/udp/4001/quic-v1");
        assert!(matches!(
            table.apply_advert(&signed, &me.user_id(), Utc::now()),
            AdvertOutcome::Dial(..)
        ));
        assert!(matches!(
            table.apply_advert(&signed, &me.user_id(), Utc::now()),
            AdvertOutcome::Dial(..)
        ));
        assert_eq!(table.peer_count(&id), 1);
    }

    #[test]
    fn test_tampered_advert_ignored() {
        let mut table = ChannelTable::default();
        let me = HostIdentity::generate();
        let peer = HostIdentity::generate();
        let id = test_instance(7);
        let topic = table.join(id.clone(), None, vec![]);
        table.activate(&id, Instant::now());

        let mut signed = signed_advert(&peer, topic, "/ip4/10.0.0.3/udp/4001/quic-v1");
        signed.advert.node_addr = "/ip4/66.66.66.66/udp/4001/quic-v1".into();
        assert!(matches!(
            table.apply_advert(&signed, &me.user_id(), Utc::now()),
            AdvertOutcome::Ignored("bad signature")
        ));
    }

    #[test]
    fn test_own_advert_skipped() {
        let mut table = ChannelTable::default();
        let me = HostIdentity::generate();
        let id = test_instance(8);
        let topic = table.join(id.clone(), None, vec![]);
        table.activate(&id, Instant::now());

        let signed = signed_advert(&me, topic, "/ip4/127.0.0.1/udp/4001/quic-v1");
        assert!(matches!(
            table.apply_advert(&signed, &me.user_id(), Utc::now()),
            AdvertOutcome::Ignored("own advertisement")
        ));
    }

    fn test_channels() -> (
        CoordinatorChannels,
        mpsc::Receiver<GossipCommand>,
        mpsc::Receiver<ControlPublish>,
        mpsc::Receiver<RealtimeFrame>,
        mpsc::Sender<ControlEvent>,
        mpsc::Sender<GossipInbound>,
    ) {
        let (gossip_tx, gossip_cmd_rx) = mpsc::channel(16);
        let (control_tx, control_pub_rx) = mpsc::channel(16);
        let (frame_tx, frame_rx) = mpsc::channel(16);
        let (control_in_tx, control_rx) = mpsc::channel(16);
        let (gossip_in_tx, gossip_rx) = mpsc::channel(16);

        (
            CoordinatorChannels {
                gossip_tx,
                control_tx,
                frame_tx,
                typing_tx: None,
                control_rx,
                gossip_rx,
            },
            gossip_cmd_rx,
            control_pub_rx,
            frame_rx,
            control_in_tx,
            gossip_in_tx,
        )
    }

    #[tokio::test]
    async fn test_join_subscribes_and_advertises() {
        let identity = Arc::new(HostIdentity::generate());
        let node_addr: Multiaddr = "/ip4/127.0.0.1/udp/4001/quic-v1".parse().unwrap();
        let (channels, mut gossip_cmd_rx, mut control_pub_rx, _frames, _cin, _gin) =
            test_channels();

        let handle = spawn_coordinator(identity.clone(), node_addr, channels);

        let id = test_instance(9);
        let hint = TopicId::generate();
        let topic = handle
            .join(id.clone(), Some(hint), vec![UserId([5u8; 32])])
            .await
            .unwrap();
        assert_eq!(topic, hint);

        match gossip_cmd_rx.recv().await.unwrap() {
            GossipCommand::Subscribe(t) => assert_eq!(t, hint.to_topic()),
            other => panic!("Expected subscribe, got {other:?}"),
        }

        let published = control_pub_rx.recv().await.unwrap();
        match published.event {
            ControlEvent::PeerAdvert(signed) => {
                assert_eq!(signed.advert.topic, hint);
                assert_eq!(signed.advert.sender, identity.user_id());
                assert!(signed.verify().is_ok());
            }
            other => panic!("Expected advert, got {other:?}"),
        }

        handle.leave(id).await;
        match gossip_cmd_rx.recv().await.unwrap() {
            GossipCommand::Unsubscribe(t) => assert_eq!(t, hint.to_topic()),
            other => panic!("Expected unsubscribe, got {other:?}"),
        }
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_inbound_frame_relayed_and_capped() {
        let identity = Arc::new(HostIdentity::generate());
        let node_addr: Multiaddr = "/ip4/127.0.0.1/udp/4001/quic-v1".parse().unwrap();
        let (channels, _gossip_cmds, _control_pub, mut frame_rx, _cin, gossip_in_tx) =
            test_channels();

        let handle = spawn_coordinator(identity, node_addr, channels);
        let id = test_instance(10);
        let topic = handle.join(id.clone(), None, vec![]).await.unwrap();

        // Oversized frame first: silently dropped.
        gossip_in_tx
            .send(GossipInbound {
                source: None,
                topic: topic.to_topic(),
                data: vec![0u8; MAX_REALTIME_FRAME_SIZE + 1],
            })
            .await
            .unwrap();

        // Frame for an unknown topic: dropped too.
        gossip_in_tx
            .send(GossipInbound {
                source: None,
                topic: TopicId::generate().to_topic(),
                data: vec![1, 2, 3],
            })
            .await
            .unwrap();

        // In-bounds frame on the joined topic: delivered.
        gossip_in_tx
            .send(GossipInbound {
                source: None,
                topic: topic.to_topic(),
                data: vec![9, 9, 9],
            })
            .await
            .unwrap();

        let frame = frame_rx.recv().await.unwrap();
        assert_eq!(frame.instance_id, id);
        assert_eq!(frame.data, vec![9, 9, 9]);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_readvertisement() {
        let identity = Arc::new(HostIdentity::generate());
        let node_addr: Multiaddr = "/ip4/127.0.0.1/udp/4001/quic-v1".parse().unwrap();
        let (channels, _gossip_cmds, mut control_pub_rx, _frames, _cin, _gin) = test_channels();

        let handle = spawn_coordinator(identity, node_addr, channels);
        let id = test_instance(11);
        handle.join(id, None, vec![]).await.unwrap();

        // Initial advert on join.
        assert!(control_pub_rx.recv().await.is_some());

        // Within the maximum refresh window plus one sweep, a refresh lands.
        tokio::time::advance(Duration::from_secs(ADVERT_REFRESH_MAX_SECS + 5)).await;
        assert!(control_pub_rx.recv().await.is_some());
        handle.shutdown().await;
    }
}
