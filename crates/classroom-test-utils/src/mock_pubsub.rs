//! Recording pub/sub bus.
//!
//! Wraps a [`LocalPubSub`] so subscribers still receive messages, and keeps
//! a log of every publish attempt. Topics can be switched to fail, to
//! exercise the transport error paths.
//!
//! # Example
//!
//! ```rust,ignore
//! let bus = RecordingPubSub::new().with_failing_topic(Topic::Highlight);
//! let mut publisher = Publisher::new(bus.as_dyn(), pid("teacher"));
//!
//! assert!(publisher.publish(highlight).is_err());
//! assert_eq!(bus.published_on(Topic::Highlight).len(), 0);
//! ```

use classroom_signaling::errors::SignalingError;
use classroom_signaling::messages::{Envelope, SignalMessage, Topic};
use classroom_signaling::pubsub::{LocalPubSub, PubSub, Subscription};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Pub/sub bus that records what was published.
#[derive(Debug, Clone)]
pub struct RecordingPubSub {
    bus: LocalPubSub,
    inner: Arc<Mutex<RecordingInner>>,
}

#[derive(Debug, Default)]
struct RecordingInner {
    published: Vec<(Topic, Envelope)>,
    failing: HashSet<Topic>,
    rejected: usize,
}

impl Default for RecordingPubSub {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingPubSub {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bus: LocalPubSub::default(),
            inner: Arc::new(Mutex::new(RecordingInner::default())),
        }
    }

    /// Reject every publish on `topic`.
    #[must_use]
    pub fn with_failing_topic(self, topic: Topic) -> Self {
        self.set_failing(topic, true);
        self
    }

    /// Switch failure injection for `topic` on or off.
    pub fn set_failing(&self, topic: Topic, failing: bool) {
        let mut inner = self.inner.lock().unwrap();
        if failing {
            inner.failing.insert(topic);
        } else {
            inner.failing.remove(&topic);
        }
    }

    /// Shared trait-object handle, as the actors expect.
    #[must_use]
    pub fn as_dyn(&self) -> Arc<dyn PubSub> {
        Arc::new(self.clone())
    }

    /// Every envelope that was accepted, in publish order.
    pub fn published(&self) -> Vec<(Topic, Envelope)> {
        self.inner.lock().unwrap().published.clone()
    }

    /// Accepted envelopes on one topic.
    pub fn published_on(&self, topic: Topic) -> Vec<Envelope> {
        self.inner
            .lock()
            .unwrap()
            .published
            .iter()
            .filter(|(t, _)| *t == topic)
            .map(|(_, envelope)| envelope.clone())
            .collect()
    }

    /// Decoded payloads on one topic.
    ///
    /// # Panics
    ///
    /// Panics if a recorded envelope does not decode.
    pub fn messages_on(&self, topic: Topic) -> Vec<SignalMessage> {
        self.published_on(topic)
            .iter()
            .map(|envelope| envelope.decode(topic).expect("recorded envelope decodes"))
            .collect()
    }

    /// Number of publishes rejected by failure injection.
    pub fn rejected(&self) -> usize {
        self.inner.lock().unwrap().rejected
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.published.clear();
        inner.rejected = 0;
    }
}

impl PubSub for RecordingPubSub {
    fn publish(&self, topic: Topic, envelope: Envelope) -> Result<(), SignalingError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.failing.contains(&topic) {
                inner.rejected += 1;
                return Err(SignalingError::Publish {
                    topic: topic.as_str(),
                    reason: "injected failure".to_string(),
                });
            }
            inner.published.push((topic, envelope.clone()));
        }
        self.bus.publish(topic, envelope)
    }

    fn subscribe(&self, topic: Topic) -> Subscription {
        self.bus.subscribe(topic)
    }
}
