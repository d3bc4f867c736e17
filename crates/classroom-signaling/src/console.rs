//! Line-oriented console front end.
//!
//! Stands in for the classroom UI and the SDK callbacks: keyboard input is
//! read line by line, the microphone and meeting are simulated and only
//! log what they would do.
//!
//! Host commands:
//!
//! | Input            | Action                                   |
//! |------------------|------------------------------------------|
//! | `0`-`9`          | Hotkey                                   |
//! | `+id[:name[:role]]` | Participant joined                    |
//! | `-id`            | Participant left                         |
//! | `?id[:name]`     | Participant waiting for admission        |
//! | `a [id]`         | Allow one, or all waiting                |
//! | `d [id]`         | Deny one, or all waiting                 |
//! | `e [id]`         | End meeting for one, or everyone         |
//! | `l [id]`         | Lower one hand, or all                   |
//!
//! Student commands: `h` raise/lower hand, `j` rejoin.
//!
//! Both: `c text` chat to everyone, `w id text` private chat, `s` state,
//! `q` quit.

use crate::config::RosterEntry;
use crate::control::{MeetingSession, MicController};
use crate::dispatcher::Hotkey;
use crate::errors::SignalingError;
use crate::observability::HealthState;

use async_trait::async_trait;
use common::types::{ParticipantId, Role};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// One parsed line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Key(Hotkey),
    Join(RosterEntry),
    Leave(ParticipantId),
    EntryRequest { id: ParticipantId, name: String },
    Allow(Option<ParticipantId>),
    Deny(Option<ParticipantId>),
    EndMeeting(Option<ParticipantId>),
    LowerHand(Option<ParticipantId>),
    RaiseHand,
    Rejoin,
    Chat {
        to: Option<ParticipantId>,
        message: String,
    },
    State,
    Quit,
}

impl ConsoleCommand {
    /// Parse a line for a participant with `role`. Blank lines yield `None`.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::InvalidMessage` for unknown commands or
    /// malformed arguments, and `SignalingError::PermissionDenied` for host
    /// commands typed by a student.
    pub fn parse(line: &str, role: Role) -> Result<Option<Self>, SignalingError> {
        let line = line.trim();
        let Some(first) = line.chars().next() else {
            return Ok(None);
        };
        let rest = line.get(first.len_utf8()..).unwrap_or_default().trim();

        let command = match first {
            c if c.is_ascii_digit() && rest.is_empty() => {
                Hotkey::from_char(c).map(ConsoleCommand::Key).ok_or_else(|| bad(line))?
            }
            '+' => ConsoleCommand::Join(RosterEntry::from_str(rest).map_err(|_| bad(line))?),
            '-' => ConsoleCommand::Leave(id(rest, line)?),
            '?' => {
                let mut parts = rest.splitn(2, ':');
                let id = id(parts.next().unwrap_or_default(), line)?;
                let name = parts
                    .next()
                    .filter(|n| !n.trim().is_empty())
                    .map_or_else(|| id.to_string(), |n| n.trim().to_string());
                ConsoleCommand::EntryRequest { id, name }
            }
            'a' => ConsoleCommand::Allow(optional_id(rest, line)?),
            'd' => ConsoleCommand::Deny(optional_id(rest, line)?),
            'e' => ConsoleCommand::EndMeeting(optional_id(rest, line)?),
            'l' => ConsoleCommand::LowerHand(optional_id(rest, line)?),
            'h' if rest.is_empty() => ConsoleCommand::RaiseHand,
            'j' if rest.is_empty() => ConsoleCommand::Rejoin,
            'c' if !rest.is_empty() => ConsoleCommand::Chat {
                to: None,
                message: rest.to_string(),
            },
            'w' => {
                let (to, message) = rest.split_once(' ').ok_or_else(|| bad(line))?;
                ConsoleCommand::Chat {
                    to: Some(id(to, line)?),
                    message: message.trim().to_string(),
                }
            }
            's' if rest.is_empty() => ConsoleCommand::State,
            'q' if rest.is_empty() => ConsoleCommand::Quit,
            _ => return Err(bad(line)),
        };

        if command.host_only() && !role.is_host() {
            return Err(SignalingError::PermissionDenied(format!(
                "{role} cannot use {line:?}"
            )));
        }
        if matches!(command, ConsoleCommand::RaiseHand | ConsoleCommand::Rejoin) && role.is_host() {
            return Err(bad(line));
        }
        Ok(Some(command))
    }

    fn host_only(&self) -> bool {
        matches!(
            self,
            ConsoleCommand::Key(_)
                | ConsoleCommand::Join(_)
                | ConsoleCommand::Leave(_)
                | ConsoleCommand::EntryRequest { .. }
                | ConsoleCommand::Allow(_)
                | ConsoleCommand::Deny(_)
                | ConsoleCommand::EndMeeting(_)
                | ConsoleCommand::LowerHand(_)
        )
    }
}

fn bad(line: &str) -> SignalingError {
    SignalingError::InvalidMessage {
        topic: "console",
        reason: format!("unrecognized command {line:?}"),
    }
}

fn id(raw: &str, line: &str) -> Result<ParticipantId, SignalingError> {
    ParticipantId::new(raw.trim()).map_err(|_| bad(line))
}

fn optional_id(raw: &str, line: &str) -> Result<Option<ParticipantId>, SignalingError> {
    if raw.is_empty() {
        Ok(None)
    } else {
        id(raw, line).map(Some)
    }
}

/// Simulated microphone that logs state changes.
#[derive(Debug, Default)]
pub struct ConsoleMic {
    on: AtomicBool,
}

impl ConsoleMic {
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MicController for ConsoleMic {
    async fn mute_mic(&self) -> Result<(), SignalingError> {
        self.on.store(false, Ordering::SeqCst);
        info!(target: "classroom.console", "Microphone muted");
        Ok(())
    }

    async fn unmute_mic(&self) -> Result<(), SignalingError> {
        self.on.store(true, Ordering::SeqCst);
        info!(target: "classroom.console", "Microphone unmuted at host request");
        Ok(())
    }
}

/// Simulated meeting session. Leaving clears readiness.
#[derive(Debug)]
pub struct ConsoleMeeting {
    health: Arc<HealthState>,
    in_meeting: AtomicBool,
}

impl ConsoleMeeting {
    #[must_use]
    pub fn new(health: Arc<HealthState>) -> Self {
        Self {
            health,
            in_meeting: AtomicBool::new(false),
        }
    }

    /// Mark the local participant as joined.
    pub fn join(&self) {
        self.in_meeting.store(true, Ordering::SeqCst);
        self.health.set_ready();
        info!(target: "classroom.console", "Joined meeting");
    }

    #[must_use]
    pub fn in_meeting(&self) -> bool {
        self.in_meeting.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeetingSession for ConsoleMeeting {
    async fn leave(&self) -> Result<(), SignalingError> {
        if !self.in_meeting.swap(false, Ordering::SeqCst) {
            return Err(SignalingError::Meeting("not in a meeting".to_string()));
        }
        self.health.set_not_ready();
        info!(target: "classroom.console", "Left meeting");
        Ok(())
    }

    fn reset_view(&self) {
        info!(target: "classroom.console", "Returned to lobby");
    }
}
