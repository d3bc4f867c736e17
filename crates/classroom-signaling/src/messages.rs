//! Wire messages for the classroom pub/sub topics.
//!
//! Each topic carries exactly one payload shape, modelled as a tagged
//! variant of [`SignalMessage`]. Payloads are JSON objects wrapped in an
//! [`Envelope`] that records the sender and a per-sender, per-topic
//! sequence number:
//!
//! ```text
//! { "senderId": "p-1", "epoch": 1767225600000, "seq": 7, "message": { ... } }
//! ```
//!
//! | Topic        | Payload                                                     |
//! |--------------|-------------------------------------------------------------|
//! | `CONTROL`    | `{type:"control", command:"mute"|"requestUnmute"|"endMeeting", to}` |
//! | `HIGHLIGHT`  | `{participantId: <id>|"all"|"none"}`                         |
//! | `CHAT`       | `{senderName, message, to?}`                                 |
//! | `RAISE_HAND` | `{senderId, senderName}`                                     |
//!
//! Inbound payloads are validated in [`SignalMessage::decode`]; anything
//! that does not match the topic's schema is rejected with
//! [`SignalingError::InvalidMessage`].

use crate::errors::SignalingError;
use common::types::ParticipantId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum accepted chat body length in bytes.
pub const MAX_CHAT_MESSAGE_BYTES: usize = 4096;

/// Highlight sentinel that clears any emphasis.
pub const HIGHLIGHT_NONE: &str = "none";

/// Highlight sentinel that emphasizes every tile.
pub const HIGHLIGHT_ALL: &str = "all";

/// Pub/sub topic names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Mic and meeting commands addressed to one participant.
    Control,
    /// Which participant tile is emphasized.
    Highlight,
    /// Public and private chat.
    Chat,
    /// Raised-hand notifications.
    RaiseHand,
}

impl Topic {
    /// Every topic, in a stable order.
    pub const ALL: [Topic; 4] = [Topic::Control, Topic::Highlight, Topic::Chat, Topic::RaiseHand];

    /// Returns the topic name used on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Topic::Control => "CONTROL",
            Topic::Highlight => "HIGHLIGHT",
            Topic::Chat => "CHAT",
            Topic::RaiseHand => "RAISE_HAND",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = SignalingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SignalingError::InvalidMessage {
                topic: "-",
                reason: format!("unknown topic {s:?}"),
            })
    }
}

/// Command carried on the `CONTROL` topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlCommand {
    /// Turn the addressee's mic off.
    Mute,
    /// Ask the addressee to turn its mic on.
    RequestUnmute,
    /// Make the addressee leave the meeting.
    EndMeeting,
}

impl ControlCommand {
    /// Returns the wire name of the command (also used as a metric label).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ControlCommand::Mute => "mute",
            ControlCommand::RequestUnmute => "requestUnmute",
            ControlCommand::EndMeeting => "endMeeting",
        }
    }
}

/// The fixed `type` discriminator of control payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
enum ControlKind {
    #[default]
    #[serde(rename = "control")]
    Control,
}

/// `CONTROL` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    kind: ControlKind,
    /// Command to execute.
    pub command: ControlCommand,
    /// Addressee.
    pub to: ParticipantId,
}

impl ControlMessage {
    /// Build a control message addressed to `to`.
    #[must_use]
    pub fn new(command: ControlCommand, to: ParticipantId) -> Self {
        Self {
            kind: ControlKind::Control,
            command,
            to,
        }
    }
}

/// Target of a highlight broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum HighlightTarget {
    /// Nothing is emphasized.
    #[default]
    None,
    /// Every tile is emphasized.
    All,
    /// Exactly one participant is emphasized.
    Participant(ParticipantId),
}

impl From<HighlightTarget> for String {
    fn from(target: HighlightTarget) -> Self {
        match target {
            HighlightTarget::None => HIGHLIGHT_NONE.to_string(),
            HighlightTarget::All => HIGHLIGHT_ALL.to_string(),
            HighlightTarget::Participant(id) => id.as_str().to_string(),
        }
    }
}

impl TryFrom<String> for HighlightTarget {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            HIGHLIGHT_NONE => Ok(HighlightTarget::None),
            HIGHLIGHT_ALL => Ok(HighlightTarget::All),
            _ => ParticipantId::new(value)
                .map(HighlightTarget::Participant)
                .map_err(|e| e.to_string()),
        }
    }
}

/// `HIGHLIGHT` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightMessage {
    /// Participant id or one of the `"all"` / `"none"` sentinels.
    pub participant_id: HighlightTarget,
}

/// `CHAT` payload. `to` is absent for messages to everyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender_name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ParticipantId>,
}

/// `RAISE_HAND` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseHandMessage {
    pub sender_id: ParticipantId,
    pub sender_name: String,
}

/// A validated payload for one of the classroom topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalMessage {
    Control(ControlMessage),
    Highlight(HighlightMessage),
    Chat(ChatMessage),
    RaiseHand(RaiseHandMessage),
}

impl SignalMessage {
    /// Topic this payload is published on.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            SignalMessage::Control(_) => Topic::Control,
            SignalMessage::Highlight(_) => Topic::Highlight,
            SignalMessage::Chat(_) => Topic::Chat,
            SignalMessage::RaiseHand(_) => Topic::RaiseHand,
        }
    }

    /// Serialize the payload to its JSON wire shape.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::Internal` if serialization fails.
    pub fn to_value(&self) -> Result<serde_json::Value, SignalingError> {
        let value = match self {
            SignalMessage::Control(m) => serde_json::to_value(m),
            SignalMessage::Highlight(m) => serde_json::to_value(m),
            SignalMessage::Chat(m) => serde_json::to_value(m),
            SignalMessage::RaiseHand(m) => serde_json::to_value(m),
        };
        value.map_err(|e| SignalingError::Internal(format!("serialize {}: {e}", self.topic())))
    }

    /// Decode and validate a payload received on `topic`.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::InvalidMessage` if the payload does not
    /// match the topic's schema.
    pub fn decode(topic: Topic, value: serde_json::Value) -> Result<Self, SignalingError> {
        let invalid = |reason: String| SignalingError::InvalidMessage {
            topic: topic.as_str(),
            reason,
        };

        let message = match topic {
            Topic::Control => serde_json::from_value(value).map(SignalMessage::Control),
            Topic::Highlight => serde_json::from_value(value).map(SignalMessage::Highlight),
            Topic::Chat => serde_json::from_value(value).map(SignalMessage::Chat),
            Topic::RaiseHand => serde_json::from_value(value).map(SignalMessage::RaiseHand),
        }
        .map_err(|e| invalid(e.to_string()))?;

        message.validate().map_err(invalid)?;
        Ok(message)
    }

    /// Field-level checks that serde cannot express.
    fn validate(&self) -> Result<(), String> {
        match self {
            SignalMessage::Control(m) => non_empty_id(&m.to, "to"),
            SignalMessage::Highlight(_) => Ok(()),
            SignalMessage::Chat(m) => {
                if m.message.trim().is_empty() {
                    return Err("message must not be empty".to_string());
                }
                if m.message.len() > MAX_CHAT_MESSAGE_BYTES {
                    return Err(format!(
                        "message exceeds {MAX_CHAT_MESSAGE_BYTES} bytes"
                    ));
                }
                match &m.to {
                    Some(to) => non_empty_id(to, "to"),
                    None => Ok(()),
                }
            }
            SignalMessage::RaiseHand(m) => non_empty_id(&m.sender_id, "senderId"),
        }
    }
}

fn non_empty_id(id: &ParticipantId, field: &str) -> Result<(), String> {
    if id.as_str().trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}

impl From<ControlMessage> for SignalMessage {
    fn from(m: ControlMessage) -> Self {
        SignalMessage::Control(m)
    }
}

impl From<HighlightMessage> for SignalMessage {
    fn from(m: HighlightMessage) -> Self {
        SignalMessage::Highlight(m)
    }
}

impl From<ChatMessage> for SignalMessage {
    fn from(m: ChatMessage) -> Self {
        SignalMessage::Chat(m)
    }
}

impl From<RaiseHandMessage> for SignalMessage {
    fn from(m: RaiseHandMessage) -> Self {
        SignalMessage::RaiseHand(m)
    }
}

/// What travels over the pub/sub channel: payload plus ordering metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Participant that published the message.
    pub sender_id: ParticipantId,
    /// Publisher start time (Unix millis); a reloaded client gets a newer epoch.
    pub epoch: i64,
    /// Monotonic per-sender, per-topic sequence number, starting at 1.
    pub seq: u64,
    /// Topic payload.
    pub message: serde_json::Value,
}

impl Envelope {
    /// Parse an envelope from its JSON text form.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::InvalidMessage` on malformed JSON.
    pub fn from_json(topic: Topic, text: &str) -> Result<Self, SignalingError> {
        serde_json::from_str(text).map_err(|e| SignalingError::InvalidMessage {
            topic: topic.as_str(),
            reason: e.to_string(),
        })
    }

    /// Render the envelope as JSON text.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::Internal` if serialization fails.
    pub fn to_json(&self) -> Result<String, SignalingError> {
        serde_json::to_string(self)
            .map_err(|e| SignalingError::Internal(format!("serialize envelope: {e}")))
    }

    /// Decode the payload for `topic`.
    ///
    /// # Errors
    ///
    /// See [`SignalMessage::decode`].
    pub fn decode(&self, topic: Topic) -> Result<SignalMessage, SignalingError> {
        SignalMessage::decode(topic, self.message.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s).unwrap()
    }

    #[test]
    fn test_control_message_wire_shape() {
        let msg = ControlMessage::new(ControlCommand::RequestUnmute, pid("p-a"));
        let value = SignalMessage::from(msg).to_value().unwrap();
        assert_eq!(
            value,
            json!({"type": "control", "command": "requestUnmute", "to": "p-a"})
        );
    }

    #[test]
    fn test_control_decode_rejects_unknown_command() {
        let err = SignalMessage::decode(
            Topic::Control,
            json!({"type": "control", "command": "explode", "to": "p-a"}),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SignalingError::InvalidMessage {
                topic: "CONTROL",
                ..
            }
        ));
    }

    #[test]
    fn test_control_decode_rejects_wrong_type_tag() {
        let result = SignalMessage::decode(
            Topic::Control,
            json!({"type": "chat", "command": "mute", "to": "p-a"}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_control_decode_rejects_empty_addressee() {
        let result = SignalMessage::decode(
            Topic::Control,
            json!({"type": "control", "command": "mute", "to": ""}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_highlight_sentinels() {
        let none = SignalMessage::decode(Topic::Highlight, json!({"participantId": "none"})).unwrap();
        assert_eq!(
            none,
            SignalMessage::Highlight(HighlightMessage {
                participant_id: HighlightTarget::None
            })
        );

        let all = SignalMessage::decode(Topic::Highlight, json!({"participantId": "all"})).unwrap();
        assert_eq!(
            all,
            SignalMessage::Highlight(HighlightMessage {
                participant_id: HighlightTarget::All
            })
        );

        let one = SignalMessage::decode(Topic::Highlight, json!({"participantId": "p-b"})).unwrap();
        assert_eq!(
            one,
            SignalMessage::Highlight(HighlightMessage {
                participant_id: HighlightTarget::Participant(pid("p-b"))
            })
        );

        assert!(SignalMessage::decode(Topic::Highlight, json!({"participantId": ""})).is_err());
        assert!(SignalMessage::decode(Topic::Highlight, json!({"participantId": 3})).is_err());
    }

    #[test]
    fn test_chat_private_and_public() {
        let public = SignalMessage::decode(
            Topic::Chat,
            json!({"senderName": "Ms. K", "message": "hello"}),
        )
        .unwrap();
        assert!(matches!(
            public,
            SignalMessage::Chat(ChatMessage { to: None, .. })
        ));

        let value = SignalMessage::Chat(ChatMessage {
            sender_name: "Ms. K".to_string(),
            message: "see me".to_string(),
            to: Some(pid("p-c")),
        })
        .to_value()
        .unwrap();
        assert_eq!(value["to"], "p-c");
    }

    #[test]
    fn test_chat_rejects_blank_body() {
        let result = SignalMessage::decode(
            Topic::Chat,
            json!({"senderName": "x", "message": "   "}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_payload_decoded_against_wrong_topic_fails() {
        let raise = json!({"senderId": "p-1", "senderName": "Ana"});
        assert!(SignalMessage::decode(Topic::RaiseHand, raise.clone()).is_ok());
        assert!(SignalMessage::decode(Topic::Control, raise).is_err());
    }

    #[test]
    fn test_envelope_json_text() {
        let envelope = Envelope {
            sender_id: pid("host"),
            epoch: 1_700_000_000_000,
            seq: 3,
            message: json!({"participantId": "all"}),
        };
        let text = envelope.to_json().unwrap();
        assert!(text.contains("\"senderId\":\"host\""));
        let back = Envelope::from_json(Topic::Highlight, &text).unwrap();
        assert_eq!(back, envelope);
        assert!(Envelope::from_json(Topic::Highlight, "{not json").is_err());
    }

    #[test]
    fn test_topic_names() {
        assert_eq!("RAISE_HAND".parse::<Topic>().unwrap(), Topic::RaiseHand);
        assert!("raise_hand".parse::<Topic>().is_err());
        assert_eq!(Topic::Control.to_string(), "CONTROL");
    }
}
