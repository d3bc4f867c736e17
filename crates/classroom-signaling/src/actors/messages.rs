//! Mailbox messages for the classroom actors.
//!
//! Request/reply uses `tokio::sync::oneshot`; fire-and-forget messages carry
//! no responder.

use crate::admission::{EntryResponder, PendingEntry};
use crate::chat::ReceivedChat;
use crate::control::ControlOutcome;
use crate::dispatcher::{GlobalMicState, Hotkey};
use crate::errors::SignalingError;
use crate::hands::RaisedHand;
use crate::messages::{HighlightTarget, SignalMessage};
use crate::roster::Participant;

use common::types::ParticipantId;
use tokio::sync::oneshot;

/// Decision on waiting participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionAction {
    Allow(ParticipantId),
    Deny(ParticipantId),
    AllowAll,
    DenyAll,
}

/// Messages sent to `HostActor`.
pub enum HostMessage {
    /// A hotkey was pressed. Replies with the messages that were published.
    KeyPressed {
        key: Hotkey,
        respond_to: oneshot::Sender<Result<Vec<SignalMessage>, SignalingError>>,
    },

    /// The SDK reported a participant joining (or updating).
    ParticipantJoined { participant: Participant },

    /// The SDK reported a participant leaving.
    ParticipantLeft { id: ParticipantId },

    /// The SDK surfaced a participant waiting to be let in.
    EntryRequested {
        id: ParticipantId,
        name: String,
        responder: Box<dyn EntryResponder>,
    },

    /// Resolve waiting participants. Replies with how many were resolved.
    Admission {
        action: AdmissionAction,
        respond_to: oneshot::Sender<Result<usize, SignalingError>>,
    },

    /// End the meeting for one participant, or for everyone when `None`.
    EndMeeting {
        target: Option<ParticipantId>,
        respond_to: oneshot::Sender<Result<usize, SignalingError>>,
    },

    /// Publish a chat line. Replies with the envelope sequence number.
    SendChat {
        message: String,
        to: Option<ParticipantId>,
        respond_to: oneshot::Sender<Result<u64, SignalingError>>,
    },

    /// Lower one raised hand, or all of them when `None`. Replies with how
    /// many went down.
    LowerHand {
        id: Option<ParticipantId>,
        respond_to: oneshot::Sender<usize>,
    },

    GetState {
        respond_to: oneshot::Sender<HostState>,
    },
}

impl std::fmt::Debug for HostMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostMessage::KeyPressed { key, .. } => {
                f.debug_struct("KeyPressed").field("key", key).finish()
            }
            HostMessage::ParticipantJoined { participant } => f
                .debug_struct("ParticipantJoined")
                .field("id", &participant.id)
                .finish(),
            HostMessage::ParticipantLeft { id } => {
                f.debug_struct("ParticipantLeft").field("id", id).finish()
            }
            HostMessage::EntryRequested { id, .. } => {
                f.debug_struct("EntryRequested").field("id", id).finish()
            }
            HostMessage::Admission { action, .. } => {
                f.debug_struct("Admission").field("action", action).finish()
            }
            HostMessage::EndMeeting { target, .. } => {
                f.debug_struct("EndMeeting").field("target", target).finish()
            }
            HostMessage::SendChat { to, .. } => f.debug_struct("SendChat").field("to", to).finish(),
            HostMessage::LowerHand { id, .. } => {
                f.debug_struct("LowerHand").field("id", id).finish()
            }
            HostMessage::GetState { .. } => f.write_str("GetState"),
        }
    }
}

/// Snapshot of the host side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostState {
    pub selected: Option<ParticipantId>,
    pub global_mic: GlobalMicState,
    /// Remote participants in hotkey order.
    pub participants: Vec<ParticipantId>,
    pub pending_entries: Vec<PendingEntry>,
    pub raised_hands: Vec<RaisedHand>,
    pub chat: Vec<ReceivedChat>,
}

/// Messages sent to `ParticipantActor`.
#[derive(Debug)]
pub enum ParticipantMessage {
    /// Raise (or lower) the local hand. Replies with the envelope sequence.
    RaiseHand {
        respond_to: oneshot::Sender<Result<u64, SignalingError>>,
    },

    SendChat {
        message: String,
        to: Option<ParticipantId>,
        respond_to: oneshot::Sender<Result<u64, SignalingError>>,
    },

    GetState {
        respond_to: oneshot::Sender<ParticipantState>,
    },
}

/// Snapshot of the participant side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantState {
    pub highlight: HighlightTarget,
    /// True if the local tile is currently emphasized.
    pub highlighted: bool,
    /// Outcome of the most recent control message addressed to us.
    pub last_control: Option<ControlOutcome>,
    pub meeting_ended: bool,
    pub chat: Vec<ReceivedChat>,
}
