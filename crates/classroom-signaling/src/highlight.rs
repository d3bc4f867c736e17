//! `HIGHLIGHT` topic receiver.

use crate::errors::SignalingError;
use crate::messages::{Envelope, HighlightTarget, SignalMessage, Topic};
use crate::observability::metrics;
use crate::pubsub::SequenceTracker;

use common::types::ParticipantId;
use tracing::debug;

/// Tracks which tile, if any, is currently emphasized.
#[derive(Debug, Default)]
pub struct HighlightReceiver {
    current: HighlightTarget,
    tracker: SequenceTracker,
}

impl HighlightReceiver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current highlight target.
    #[must_use]
    pub fn current(&self) -> &HighlightTarget {
        &self.current
    }

    /// True if `id` should render emphasized.
    #[must_use]
    pub fn is_highlighted(&self, id: &ParticipantId) -> bool {
        match &self.current {
            HighlightTarget::None => false,
            HighlightTarget::All => true,
            HighlightTarget::Participant(p) => p == id,
        }
    }

    /// Apply one envelope. Returns false if it was stale and ignored.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::InvalidMessage` for payloads that are not
    /// highlight messages.
    pub fn handle(&mut self, envelope: &Envelope) -> Result<bool, SignalingError> {
        let SignalMessage::Highlight(message) = envelope.decode(Topic::Highlight)? else {
            return Err(SignalingError::InvalidMessage {
                topic: Topic::Highlight.as_str(),
                reason: "not a highlight payload".to_string(),
            });
        };

        if !self.tracker.accept(envelope) {
            metrics::record_stale(Topic::Highlight);
            return Ok(false);
        }

        debug!(
            target: "classroom.highlight",
            sender_id = %envelope.sender_id,
            target_id = %String::from(message.participant_id.clone()),
            "Highlight updated"
        );
        self.current = message.participant_id;
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::messages::HighlightMessage;

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s).unwrap()
    }

    fn envelope(sender: &str, seq: u64, target: HighlightTarget) -> Envelope {
        Envelope {
            sender_id: pid(sender),
            epoch: 7,
            seq,
            message: SignalMessage::Highlight(HighlightMessage {
                participant_id: target,
            })
            .to_value()
            .unwrap(),
        }
    }

    #[test]
    fn test_starts_with_nothing_highlighted() {
        let receiver = HighlightReceiver::new();
        assert_eq!(receiver.current(), &HighlightTarget::None);
        assert!(!receiver.is_highlighted(&pid("a")));
    }

    #[test]
    fn test_participant_all_and_none() {
        let mut receiver = HighlightReceiver::new();

        receiver
            .handle(&envelope("host", 1, HighlightTarget::Participant(pid("a"))))
            .unwrap();
        assert!(receiver.is_highlighted(&pid("a")));
        assert!(!receiver.is_highlighted(&pid("b")));

        receiver
            .handle(&envelope("host", 2, HighlightTarget::All))
            .unwrap();
        assert!(receiver.is_highlighted(&pid("b")));

        receiver
            .handle(&envelope("host", 3, HighlightTarget::None))
            .unwrap();
        assert!(!receiver.is_highlighted(&pid("a")));
        assert!(!receiver.is_highlighted(&pid("b")));
    }

    #[test]
    fn test_stale_highlight_is_ignored() {
        let mut receiver = HighlightReceiver::new();
        assert!(receiver
            .handle(&envelope("host", 5, HighlightTarget::None))
            .unwrap());
        assert!(!receiver
            .handle(&envelope("host", 4, HighlightTarget::Participant(pid("a"))))
            .unwrap());
        assert_eq!(receiver.current(), &HighlightTarget::None);
    }

    #[test]
    fn test_sequences_are_per_sender() {
        let mut receiver = HighlightReceiver::new();
        receiver
            .handle(&envelope("host-1", 9, HighlightTarget::All))
            .unwrap();
        assert!(receiver
            .handle(&envelope("host-2", 1, HighlightTarget::Participant(pid("c"))))
            .unwrap());
        assert_eq!(
            receiver.current(),
            &HighlightTarget::Participant(pid("c"))
        );
    }
}
