//! Pub/sub channel abstraction.
//!
//! The real-time SDK provides the actual broadcast channel; this module
//! models it with the [`PubSub`] trait so the signaling logic can run
//! against any transport. [`LocalPubSub`] is an in-process implementation
//! built on `tokio::sync::broadcast` (one channel per topic), used by the
//! console binary and by tests.
//!
//! Ordering: a broadcast channel delivers one sender's messages in send
//! order. Nothing orders messages across topics.
//!
//! [`Publisher`] stamps outgoing envelopes with a per-topic sequence
//! number; [`SequenceTracker`] lets receivers drop anything older than what
//! they already applied from the same sender.

use crate::errors::SignalingError;
use crate::messages::{Envelope, SignalMessage, Topic};
use crate::observability::metrics;

use common::types::ParticipantId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default per-topic channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast primitive: publish to a topic, subscribe to a topic.
pub trait PubSub: Send + Sync {
    /// Publish an envelope on `topic`.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::Publish` if the transport rejects the message.
    fn publish(&self, topic: Topic, envelope: Envelope) -> Result<(), SignalingError>;

    /// Subscribe to every envelope published on `topic` from now on.
    fn subscribe(&self, topic: Topic) -> Subscription;
}

/// Receiving side of a topic subscription.
#[derive(Debug)]
pub struct Subscription {
    topic: Topic,
    receiver: broadcast::Receiver<Envelope>,
}

impl Subscription {
    /// Wrap a broadcast receiver for `topic`.
    #[must_use]
    pub fn new(topic: Topic, receiver: broadcast::Receiver<Envelope>) -> Self {
        Self { topic, receiver }
    }

    /// Topic this subscription listens on.
    #[must_use]
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Wait for the next envelope.
    ///
    /// Returns `None` once the channel is closed. Lagging behind the
    /// channel capacity drops the overflowed messages and keeps going.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        target: "classroom.pubsub",
                        topic = %self.topic,
                        skipped,
                        "Subscriber lagged, messages dropped"
                    );
                    metrics::record_lagged(self.topic, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive, for draining in tests and shutdown paths.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    metrics::record_lagged(self.topic, skipped);
                }
                Err(_) => return None,
            }
        }
    }
}

/// In-process pub/sub bus with one broadcast channel per topic.
#[derive(Debug, Clone)]
pub struct LocalPubSub {
    channels: Arc<HashMap<Topic, broadcast::Sender<Envelope>>>,
}

impl Default for LocalPubSub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl LocalPubSub {
    /// Create a bus whose topics each buffer `capacity` envelopes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let channels = Topic::ALL
            .into_iter()
            .map(|topic| (topic, broadcast::channel(capacity.max(1)).0))
            .collect();
        Self {
            channels: Arc::new(channels),
        }
    }

    /// Number of live subscribers on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.channels
            .get(&topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl PubSub for LocalPubSub {
    fn publish(&self, topic: Topic, envelope: Envelope) -> Result<(), SignalingError> {
        let sender = self
            .channels
            .get(&topic)
            .ok_or_else(|| SignalingError::Publish {
                topic: topic.as_str(),
                reason: "topic not registered".to_string(),
            })?;

        // Publishing into an empty room is not an error.
        if sender.send(envelope).is_err() {
            debug!(
                target: "classroom.pubsub",
                topic = %topic,
                "Published with no subscribers"
            );
        }
        Ok(())
    }

    fn subscribe(&self, topic: Topic) -> Subscription {
        match self.channels.get(&topic) {
            Some(sender) => Subscription::new(topic, sender.subscribe()),
            // Every topic is registered in `new`; a closed receiver keeps the
            // signature infallible if that ever changes.
            None => Subscription::new(topic, broadcast::channel(1).1),
        }
    }
}

/// Publishing side bound to one sender, stamping sequence numbers.
pub struct Publisher {
    bus: Arc<dyn PubSub>,
    sender_id: ParticipantId,
    epoch: i64,
    next_seq: HashMap<Topic, u64>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("sender_id", &self.sender_id)
            .field("epoch", &self.epoch)
            .field("next_seq", &self.next_seq)
            .finish_non_exhaustive()
    }
}

impl Publisher {
    /// Create a publisher whose epoch is the current wall-clock time.
    #[must_use]
    pub fn new(bus: Arc<dyn PubSub>, sender_id: ParticipantId) -> Self {
        Self::with_epoch(bus, sender_id, chrono::Utc::now().timestamp_millis())
    }

    /// Create a publisher with an explicit epoch.
    #[must_use]
    pub fn with_epoch(bus: Arc<dyn PubSub>, sender_id: ParticipantId, epoch: i64) -> Self {
        Self {
            bus,
            sender_id,
            epoch,
            next_seq: HashMap::new(),
        }
    }

    /// Participant this publisher speaks for.
    #[must_use]
    pub fn sender_id(&self) -> &ParticipantId {
        &self.sender_id
    }

    /// Publish `message` on its topic. Returns the sequence number used.
    ///
    /// The sequence number is consumed even if the transport fails, so a
    /// later success is never mistaken for a duplicate.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::Publish` or `SignalingError::Internal`.
    pub fn publish(&mut self, message: impl Into<SignalMessage>) -> Result<u64, SignalingError> {
        let message = message.into();
        let topic = message.topic();
        let payload = message.to_value()?;

        let seq = {
            let next = self.next_seq.entry(topic).or_insert(1);
            let seq = *next;
            *next = next.saturating_add(1);
            seq
        };

        let envelope = Envelope {
            sender_id: self.sender_id.clone(),
            epoch: self.epoch,
            seq,
            message: payload,
        };

        match self.bus.publish(topic, envelope) {
            Ok(()) => {
                metrics::record_published(&message);
                Ok(seq)
            }
            Err(e) => {
                metrics::record_publish_failure(topic);
                Err(e)
            }
        }
    }
}

/// Per-sender high-water marks for one topic.
#[derive(Debug, Default, Clone)]
pub struct SequenceTracker {
    last: HashMap<ParticipantId, (i64, u64)>,
}

impl SequenceTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the envelope if it is newer than anything seen from its sender.
    ///
    /// Newer means a later epoch, or the same epoch with a higher `seq`.
    pub fn accept(&mut self, envelope: &Envelope) -> bool {
        let incoming = (envelope.epoch, envelope.seq);
        match self.last.get(&envelope.sender_id) {
            Some(&seen) if incoming <= seen => false,
            _ => {
                self.last.insert(envelope.sender_id.clone(), incoming);
                true
            }
        }
    }

    /// Forget a sender (e.g. when it leaves the meeting).
    pub fn forget(&mut self, sender: &ParticipantId) {
        self.last.remove(sender);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::messages::{ControlCommand, ControlMessage, HighlightMessage, HighlightTarget};
    use serde_json::json;

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s).unwrap()
    }

    fn envelope(sender: &str, epoch: i64, seq: u64) -> Envelope {
        Envelope {
            sender_id: pid(sender),
            epoch,
            seq,
            message: json!({}),
        }
    }

    #[tokio::test]
    async fn test_local_pubsub_delivers_in_send_order() {
        let bus = LocalPubSub::new(16);
        let mut sub = bus.subscribe(Topic::Control);

        for seq in 1..=3 {
            bus.publish(Topic::Control, envelope("host", 1, seq)).unwrap();
        }

        for expected in 1..=3 {
            assert_eq!(sub.recv().await.unwrap().seq, expected);
        }
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let bus = LocalPubSub::new(16);
        let mut control = bus.subscribe(Topic::Control);
        let mut highlight = bus.subscribe(Topic::Highlight);

        bus.publish(Topic::Highlight, envelope("host", 1, 1)).unwrap();

        assert!(control.try_recv().is_none());
        assert!(highlight.try_recv().is_some());
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let bus = LocalPubSub::new(4);
        assert_eq!(bus.subscriber_count(Topic::Chat), 0);
        assert!(bus.publish(Topic::Chat, envelope("host", 1, 1)).is_ok());
    }

    #[tokio::test]
    async fn test_lagged_subscriber_keeps_receiving() {
        let bus = LocalPubSub::new(2);
        let mut sub = bus.subscribe(Topic::Control);

        for seq in 1..=5 {
            bus.publish(Topic::Control, envelope("host", 1, seq)).unwrap();
        }

        // Oldest messages were overwritten; the newest two survive.
        assert_eq!(sub.recv().await.unwrap().seq, 4);
        assert_eq!(sub.recv().await.unwrap().seq, 5);
    }

    #[tokio::test]
    async fn test_publisher_sequences_per_topic() {
        let bus = Arc::new(LocalPubSub::new(16));
        let mut control = bus.subscribe(Topic::Control);
        let mut highlight = bus.subscribe(Topic::Highlight);
        let mut publisher = Publisher::with_epoch(bus.clone(), pid("host"), 42);

        let a = publisher
            .publish(ControlMessage::new(ControlCommand::Mute, pid("s1")))
            .unwrap();
        let b = publisher
            .publish(HighlightMessage {
                participant_id: HighlightTarget::All,
            })
            .unwrap();
        let c = publisher
            .publish(ControlMessage::new(ControlCommand::RequestUnmute, pid("s1")))
            .unwrap();

        assert_eq!((a, b, c), (1, 1, 2));

        let first = control.recv().await.unwrap();
        assert_eq!(first.sender_id, pid("host"));
        assert_eq!(first.epoch, 42);
        assert_eq!(first.message["command"], "mute");
        assert_eq!(control.recv().await.unwrap().seq, 2);
        assert_eq!(highlight.recv().await.unwrap().message["participantId"], "all");
    }

    #[test]
    fn test_sequence_tracker_discards_stale_and_duplicates() {
        let mut tracker = SequenceTracker::new();

        assert!(tracker.accept(&envelope("host", 1, 2)));
        assert!(!tracker.accept(&envelope("host", 1, 1)), "older seq is stale");
        assert!(!tracker.accept(&envelope("host", 1, 2)), "duplicate is stale");
        assert!(tracker.accept(&envelope("host", 1, 3)));

        // Independent per sender.
        assert!(tracker.accept(&envelope("cohost", 1, 1)));
    }

    #[test]
    fn test_sequence_tracker_accepts_new_epoch() {
        let mut tracker = SequenceTracker::new();
        assert!(tracker.accept(&envelope("host", 100, 50)));
        // Host reloaded: counter restarts under a newer epoch.
        assert!(tracker.accept(&envelope("host", 200, 1)));
        // Late message from the previous page load.
        assert!(!tracker.accept(&envelope("host", 100, 51)));
    }

    #[test]
    fn test_sequence_tracker_forget() {
        let mut tracker = SequenceTracker::new();
        assert!(tracker.accept(&envelope("host", 1, 5)));
        tracker.forget(&pid("host"));
        assert!(tracker.accept(&envelope("host", 1, 1)));
    }
}
