//! Receiver-side tracking of typing announcements.
//!
//! Same short-expiry announcement pattern as peer advertisements: the
//! transport cannot expire privacy-wrapped events server-side, so every
//! announcement carries a client-honored expiry and the indicator is
//! cleared the moment a real message from the sender lands.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use capsule_shared::constants::TYPING_MARKER;
use capsule_shared::{TypingAnnouncement, UserId};

#[derive(Debug, Clone)]
struct TypingState {
    /// When the announcement was taken in, for ordering against messages.
    observed_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    display_name: String,
}

/// Tracks who is currently composing, per the announcements received.
#[derive(Debug, Default)]
pub struct TypingTracker {
    /// Only announcements from already-known senders are displayed.
    known_senders: HashSet<UserId>,
    active: HashMap<UserId, TypingState>,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_known_sender(&mut self, sender: UserId) {
        self.known_senders.insert(sender);
    }

    pub fn remove_known_sender(&mut self, sender: &UserId) {
        self.known_senders.remove(sender);
        self.active.remove(sender);
    }

    /// Take in one announcement. Returns whether it was accepted.
    pub fn ingest(&mut self, announcement: &TypingAnnouncement, now: DateTime<Utc>) -> bool {
        if announcement.marker != TYPING_MARKER {
            debug!(marker = %announcement.marker, "Ignoring announcement with unknown marker");
            return false;
        }
        if announcement.is_expired(now) {
            debug!(sender = %announcement.sender.short(), "Ignoring expired typing announcement");
            return false;
        }
        if !self.known_senders.contains(&announcement.sender) {
            debug!(sender = %announcement.sender.short(), "Ignoring typing from unknown sender");
            return false;
        }

        self.active.insert(
            announcement.sender,
            TypingState {
                observed_at: now,
                expires_at: announcement.expires_at,
                display_name: announcement.sender_display_name.clone(),
            },
        );
        true
    }

    /// A real message from `sender` arrived; clear the indicator if the
    /// message is newer than the announcement being displayed.
    pub fn observe_message(&mut self, sender: &UserId, message_at: DateTime<Utc>) {
        if let Some(state) = self.active.get(sender) {
            if message_at > state.observed_at {
                self.active.remove(sender);
            }
        }
    }

    /// Senders currently composing. Prunes expired entries as it goes.
    pub fn active_senders(&mut self, now: DateTime<Utc>) -> Vec<(UserId, String)> {
        self.active.retain(|_, state| now < state.expires_at);
        self.active
            .iter()
            .map(|(sender, state)| (*sender, state.display_name.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn announcement(sender: UserId) -> TypingAnnouncement {
        TypingAnnouncement::new(sender, "Alice".to_string(), vec![UserId([0u8; 32])])
    }

    #[test]
    fn test_unknown_sender_ignored() {
        let mut tracker = TypingTracker::new();
        let sender = UserId([1u8; 32]);

        assert!(!tracker.ingest(&announcement(sender), Utc::now()));
        assert!(tracker.active_senders(Utc::now()).is_empty());

        tracker.add_known_sender(sender);
        assert!(tracker.ingest(&announcement(sender), Utc::now()));
        assert_eq!(tracker.active_senders(Utc::now()).len(), 1);
    }

    #[test]
    fn test_expired_announcement_discarded() {
        let mut tracker = TypingTracker::new();
        let sender = UserId([2u8; 32]);
        tracker.add_known_sender(sender);

        let mut stale = announcement(sender);
        stale.expires_at = Utc::now() - Duration::seconds(1);
        assert!(!tracker.ingest(&stale, Utc::now()));
    }

    #[test]
    fn test_indicator_expires_over_time() {
        let mut tracker = TypingTracker::new();
        let sender = UserId([3u8; 32]);
        tracker.add_known_sender(sender);

        tracker.ingest(&announcement(sender), Utc::now());
        assert_eq!(tracker.active_senders(Utc::now()).len(), 1);
        assert!(tracker
            .active_senders(Utc::now() + Duration::seconds(31))
            .is_empty());
    }

    #[test]
    fn test_later_message_clears_indicator() {
        let mut tracker = TypingTracker::new();
        let sender = UserId([4u8; 32]);
        tracker.add_known_sender(sender);

        let now = Utc::now();
        tracker.ingest(&announcement(sender), now);

        // A message older than the announcement leaves the indicator up.
        tracker.observe_message(&sender, now - Duration::seconds(5));
        assert_eq!(tracker.active_senders(now).len(), 1);

        // A newer one clears it.
        tracker.observe_message(&sender, now + Duration::seconds(1));
        assert!(tracker.active_senders(now).is_empty());
    }

    #[test]
    fn test_wrong_marker_ignored() {
        let mut tracker = TypingTracker::new();
        let sender = UserId([5u8; 32]);
        tracker.add_known_sender(sender);

        let mut odd = announcement(sender);
        odd.marker = "idle".to_string();
        assert!(!tracker.ingest(&odd, Utc::now()));
    }
}
