//! `CHAT` topic inbox.

use crate::errors::SignalingError;
use crate::messages::{ChatMessage, Envelope, SignalMessage, Topic, MAX_CHAT_MESSAGE_BYTES};
use crate::observability::metrics;
use crate::pubsub::SequenceTracker;

use chrono::{DateTime, Utc};
use common::types::ParticipantId;
use std::collections::VecDeque;

/// Chat lines kept per inbox; the oldest are dropped first.
pub const MAX_CHAT_HISTORY: usize = 200;

/// Build an outgoing chat payload, applying the same body checks the
/// receiving side does.
///
/// # Errors
///
/// Returns `SignalingError::InvalidMessage` for blank or oversized bodies.
pub fn compose(
    sender_name: &str,
    message: impl Into<String>,
    to: Option<ParticipantId>,
) -> Result<ChatMessage, SignalingError> {
    let message = message.into();
    let invalid = |reason: &str| SignalingError::InvalidMessage {
        topic: Topic::Chat.as_str(),
        reason: reason.to_string(),
    };
    if message.trim().is_empty() {
        return Err(invalid("message must not be empty"));
    }
    if message.len() > MAX_CHAT_MESSAGE_BYTES {
        return Err(invalid("message too long"));
    }
    Ok(ChatMessage {
        sender_name: sender_name.to_string(),
        message,
        to,
    })
}

/// A chat line as shown to the local participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedChat {
    pub sender_id: ParticipantId,
    pub sender_name: String,
    pub message: String,
    /// True if addressed only to the local participant.
    pub private: bool,
    pub received_at: DateTime<Utc>,
}

/// Keeps chat messages visible to the local participant.
#[derive(Debug)]
pub struct ChatInbox {
    local_id: ParticipantId,
    messages: VecDeque<ReceivedChat>,
    tracker: SequenceTracker,
}

impl ChatInbox {
    #[must_use]
    pub fn new(local_id: ParticipantId) -> Self {
        Self {
            local_id,
            messages: VecDeque::new(),
            tracker: SequenceTracker::new(),
        }
    }

    /// Retained messages, oldest first.
    pub fn messages(&self) -> impl ExactSizeIterator<Item = &ReceivedChat> + '_ {
        self.messages.iter()
    }

    /// Apply one envelope. Returns the stored message, or `None` if it was
    /// private to someone else, sent by us, or stale.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::InvalidMessage` for malformed chat payloads.
    pub fn handle(&mut self, envelope: &Envelope) -> Result<Option<&ReceivedChat>, SignalingError> {
        let SignalMessage::Chat(ChatMessage {
            sender_name,
            message,
            to,
        }) = envelope.decode(Topic::Chat)?
        else {
            return Err(SignalingError::InvalidMessage {
                topic: Topic::Chat.as_str(),
                reason: "not a chat payload".to_string(),
            });
        };

        // Our own messages echo back on the shared topic.
        if envelope.sender_id == self.local_id {
            return Ok(None);
        }
        if to.as_ref().is_some_and(|to| to != &self.local_id) {
            return Ok(None);
        }
        if !self.tracker.accept(envelope) {
            metrics::record_stale(Topic::Chat);
            return Ok(None);
        }

        if self.messages.len() >= MAX_CHAT_HISTORY {
            self.messages.pop_front();
        }
        self.messages.push_back(ReceivedChat {
            sender_id: envelope.sender_id.clone(),
            sender_name,
            message,
            private: to.is_some(),
            received_at: Utc::now(),
        });
        Ok(self.messages.back())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s).unwrap()
    }

    fn envelope(sender: &str, seq: u64, message: &str, to: Option<&str>) -> Envelope {
        Envelope {
            sender_id: pid(sender),
            epoch: 1,
            seq,
            message: SignalMessage::Chat(ChatMessage {
                sender_name: sender.to_uppercase(),
                message: message.to_string(),
                to: to.map(pid),
            })
            .to_value()
            .unwrap(),
        }
    }

    #[test]
    fn test_keeps_public_and_own_private_messages() {
        let mut inbox = ChatInbox::new(pid("me"));

        assert!(inbox.handle(&envelope("t", 1, "hello all", None)).unwrap().is_some());
        assert!(inbox
            .handle(&envelope("t", 2, "psst", Some("other")))
            .unwrap()
            .is_none());
        let private = inbox
            .handle(&envelope("t", 3, "just you", Some("me")))
            .unwrap()
            .cloned()
            .unwrap();

        assert!(private.private);
        assert_eq!(inbox.messages().len(), 2);
    }

    #[test]
    fn test_skips_own_echo() {
        let mut inbox = ChatInbox::new(pid("me"));
        assert!(inbox.handle(&envelope("me", 1, "hi", None)).unwrap().is_none());
        assert!(inbox.messages().next().is_none());
    }

    #[test]
    fn test_history_drops_oldest_past_cap() {
        let mut inbox = ChatInbox::new(pid("me"));
        let total = u64::try_from(MAX_CHAT_HISTORY).unwrap() + 3;
        for seq in 1..=total {
            inbox
                .handle(&envelope("t", seq, &format!("line {seq}"), None))
                .unwrap();
        }

        assert_eq!(inbox.messages().len(), MAX_CHAT_HISTORY);
        assert_eq!(inbox.messages().next().unwrap().message, "line 4");
        assert_eq!(
            inbox.messages().last().unwrap().message,
            format!("line {total}")
        );
    }

    #[test]
    fn test_compose_checks_body() {
        assert!(compose("T", "hello", None).is_ok());
        assert!(compose("T", " \n", None).is_err());
        assert!(compose("T", "x".repeat(MAX_CHAT_MESSAGE_BYTES + 1), Some(pid("s"))).is_err());
    }

    #[test]
    fn test_rejects_blank_body() {
        let mut inbox = ChatInbox::new(pid("me"));
        assert!(matches!(
            inbox.handle(&envelope("t", 1, "   ", None)),
            Err(SignalingError::InvalidMessage { .. })
        ));
    }
}
