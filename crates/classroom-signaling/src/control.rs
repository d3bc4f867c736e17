//! `CONTROL` topic receiver.
//!
//! Applies `mute` / `requestUnmute` / `endMeeting` commands addressed to the
//! local participant. Commands addressed to someone else are ignored, and
//! commands older than one already applied from the same sender are
//! discarded.
//!
//! Mic failures are logged and counted, never retried.

use crate::errors::SignalingError;
use crate::messages::{ControlCommand, Envelope, SignalMessage, Topic};
use crate::observability::metrics;
use crate::pubsub::SequenceTracker;
use crate::session::SessionFlags;

use async_trait::async_trait;
use common::types::ParticipantId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Local microphone, provided by the SDK.
#[async_trait]
pub trait MicController: Send + Sync {
    /// Turn the local mic off.
    async fn mute_mic(&self) -> Result<(), SignalingError>;

    /// Turn the local mic on.
    async fn unmute_mic(&self) -> Result<(), SignalingError>;
}

/// Local meeting handle, provided by the SDK and the router.
#[async_trait]
pub trait MeetingSession: Send + Sync {
    /// Leave the meeting.
    async fn leave(&self) -> Result<(), SignalingError>;

    /// Navigate away from the meeting view.
    fn reset_view(&self);
}

/// What a control message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Addressed to another participant.
    NotAddressed,
    /// Older than a message already applied.
    Stale,
    MicMuted,
    MicUnmuted,
    /// The mic call failed; the error was logged.
    MicFailed(ControlCommand),
    /// The local participant left the meeting.
    MeetingEnded,
}

/// Applies inbound control commands to the local participant.
pub struct ControlReceiver {
    local_id: ParticipantId,
    mic: Arc<dyn MicController>,
    meeting: Arc<dyn MeetingSession>,
    session: Arc<SessionFlags>,
    rejoin_suppression: Duration,
    tracker: SequenceTracker,
}

impl ControlReceiver {
    pub fn new(
        local_id: ParticipantId,
        mic: Arc<dyn MicController>,
        meeting: Arc<dyn MeetingSession>,
        session: Arc<SessionFlags>,
        rejoin_suppression: Duration,
    ) -> Self {
        Self {
            local_id,
            mic,
            meeting,
            session,
            rejoin_suppression,
            tracker: SequenceTracker::new(),
        }
    }

    /// Decode and apply one envelope from the `CONTROL` topic.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::InvalidMessage` if the payload is not a
    /// control message. Mic and leave failures are not errors here.
    pub async fn handle(&mut self, envelope: &Envelope) -> Result<ControlOutcome, SignalingError> {
        let SignalMessage::Control(message) = envelope.decode(Topic::Control)? else {
            return Err(SignalingError::InvalidMessage {
                topic: Topic::Control.as_str(),
                reason: "not a control payload".to_string(),
            });
        };

        if message.to != self.local_id {
            return Ok(ControlOutcome::NotAddressed);
        }

        if !self.tracker.accept(envelope) {
            debug!(
                target: "classroom.control",
                sender_id = %envelope.sender_id,
                seq = envelope.seq,
                command = message.command.as_str(),
                "Discarding stale control message"
            );
            metrics::record_stale(Topic::Control);
            return Ok(ControlOutcome::Stale);
        }

        let outcome = match message.command {
            ControlCommand::Mute => match self.mic.mute_mic().await {
                Ok(()) => ControlOutcome::MicMuted,
                Err(e) => self.mic_failed(ControlCommand::Mute, &e),
            },
            ControlCommand::RequestUnmute => match self.mic.unmute_mic().await {
                Ok(()) => ControlOutcome::MicUnmuted,
                Err(e) => self.mic_failed(ControlCommand::RequestUnmute, &e),
            },
            ControlCommand::EndMeeting => {
                self.end_meeting(&envelope.sender_id).await;
                ControlOutcome::MeetingEnded
            }
        };

        Ok(outcome)
    }

    fn mic_failed(&self, command: ControlCommand, error: &SignalingError) -> ControlOutcome {
        warn!(
            target: "classroom.control",
            participant_id = %self.local_id,
            command = command.as_str(),
            error = %error,
            "Mic operation failed"
        );
        metrics::record_mic_failure(command);
        ControlOutcome::MicFailed(command)
    }

    async fn end_meeting(&self, ended_by: &ParticipantId) {
        info!(
            target: "classroom.control",
            participant_id = %self.local_id,
            ended_by = %ended_by,
            suppress_secs = self.rejoin_suppression.as_secs(),
            "Meeting ended by host"
        );

        // Suppress before leaving so a reconnect triggered by leave() is refused.
        self.session.suppress_rejoin(self.rejoin_suppression);

        if let Err(e) = self.meeting.leave().await {
            warn!(
                target: "classroom.control",
                error = %e,
                "Leave failed after endMeeting"
            );
        }
        self.meeting.reset_view();
    }
}
