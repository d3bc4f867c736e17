//! Raised hands, as seen by the host.

use crate::errors::SignalingError;
use crate::messages::{Envelope, RaiseHandMessage, SignalMessage, Topic};
use crate::observability::metrics;
use crate::pubsub::SequenceTracker;

use chrono::{DateTime, Utc};
use common::types::ParticipantId;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaisedHand {
    pub id: ParticipantId,
    pub name: String,
    pub raised_at: DateTime<Utc>,
}

/// Result of applying a `RAISE_HAND` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandChange {
    Raised(ParticipantId),
    Lowered(ParticipantId),
    Ignored,
}

/// Raised hands in the order they went up.
#[derive(Debug, Default)]
pub struct RaiseHandTracker {
    hands: Vec<RaisedHand>,
    tracker: SequenceTracker,
}

impl RaiseHandTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn raised(&self) -> &[RaisedHand] {
        &self.hands
    }

    #[must_use]
    pub fn is_raised(&self, id: &ParticipantId) -> bool {
        self.hands.iter().any(|h| &h.id == id)
    }

    /// Apply one envelope. A second raise from a participant whose hand is
    /// already up lowers it.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::InvalidMessage` for malformed payloads.
    pub fn handle(&mut self, envelope: &Envelope) -> Result<HandChange, SignalingError> {
        let SignalMessage::RaiseHand(RaiseHandMessage {
            sender_id,
            sender_name,
        }) = envelope.decode(Topic::RaiseHand)?
        else {
            return Err(SignalingError::InvalidMessage {
                topic: Topic::RaiseHand.as_str(),
                reason: "not a raise-hand payload".to_string(),
            });
        };

        if !self.tracker.accept(envelope) {
            metrics::record_stale(Topic::RaiseHand);
            return Ok(HandChange::Ignored);
        }

        Ok(self.toggle(sender_id, sender_name))
    }

    /// Raise or lower `id`'s hand.
    pub fn toggle(&mut self, id: ParticipantId, name: String) -> HandChange {
        if self.lower(&id) {
            return HandChange::Lowered(id);
        }
        debug!(target: "classroom.hands", participant_id = %id, "Hand raised");
        self.hands.push(RaisedHand {
            id: id.clone(),
            name,
            raised_at: Utc::now(),
        });
        HandChange::Raised(id)
    }

    /// Lower one hand. Returns false if it was not raised.
    pub fn lower(&mut self, id: &ParticipantId) -> bool {
        let before = self.hands.len();
        self.hands.retain(|h| &h.id != id);
        let lowered = self.hands.len() != before;
        if lowered {
            debug!(target: "classroom.hands", participant_id = %id, "Hand lowered");
        }
        lowered
    }

    /// Lower every hand. Returns how many were up.
    pub fn clear(&mut self) -> usize {
        let count = self.hands.len();
        self.hands.clear();
        count
    }
}
