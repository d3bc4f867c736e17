//! Host hotkey dispatcher.
//!
//! Translates digit keys pressed by the teacher into `CONTROL` and
//! `HIGHLIGHT` messages:
//!
//! | Key          | Effect                                                          |
//! |--------------|-----------------------------------------------------------------|
//! | `1`-`4`,`6`-`9` | Select the Nth remote participant (1-based), or deselect it if already selected |
//! | `0`          | Select a random remote participant, avoiding the current one     |
//! | `5`          | Toggle mute/unmute for every remote student                     |
//!
//! Selecting unmutes the new participant and mutes the previous one, so at
//! most one participant is ever selected. The `5` toggle leaves the
//! selection alone.
//!
//! The dispatcher only computes the messages; publishing them is up to the
//! caller (see [`crate::actors::host`]).

use crate::errors::SignalingError;
use crate::messages::{ControlCommand, ControlMessage, HighlightMessage, HighlightTarget, SignalMessage};
use crate::roster::Roster;

use common::types::{ParticipantId, Role};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Attempts made by the random pick before falling back to a fixed choice.
pub const DEFAULT_RANDOM_PICK_ATTEMPTS: usize = 20;

/// Digit key that toggles everyone's mic.
const TOGGLE_ALL_DIGIT: u8 = 5;

/// A host hotkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hotkey {
    /// Select the remote participant at this zero-based position.
    Select(usize),
    /// Select a random remote participant.
    Random,
    /// Toggle the global mute state.
    ToggleAll,
}

impl Hotkey {
    /// Map a digit 0-9 to its hotkey. Anything else maps to `None`.
    #[must_use]
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Hotkey::Random),
            TOGGLE_ALL_DIGIT => Some(Hotkey::ToggleAll),
            1..=9 => Some(Hotkey::Select(usize::from(digit - 1))),
            _ => None,
        }
    }

    /// Map a key character (`'0'`..=`'9'`) to its hotkey.
    #[must_use]
    pub fn from_char(key: char) -> Option<Self> {
        key.to_digit(10)
            .and_then(|d| u8::try_from(d).ok())
            .and_then(Self::from_digit)
    }
}

/// Mic state applied by the last bulk toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlobalMicState {
    /// Students are muted (initial state).
    #[default]
    AllMuted,
    /// Students were asked to unmute.
    AllUnmuted,
}

impl GlobalMicState {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            GlobalMicState::AllMuted => GlobalMicState::AllUnmuted,
            GlobalMicState::AllUnmuted => GlobalMicState::AllMuted,
        }
    }
}

/// Hotkey state machine for the host.
#[derive(Debug)]
pub struct ControlDispatcher<R = StdRng> {
    role: Role,
    selected: Option<ParticipantId>,
    global: GlobalMicState,
    random_attempts: usize,
    rng: R,
}

impl ControlDispatcher<StdRng> {
    /// Dispatcher for a participant with `role`, seeded from OS entropy.
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self::with_rng(role, StdRng::from_entropy())
    }
}

impl<R: Rng> ControlDispatcher<R> {
    /// Dispatcher with an explicit random source.
    pub fn with_rng(role: Role, rng: R) -> Self {
        Self {
            role,
            selected: None,
            global: GlobalMicState::default(),
            random_attempts: DEFAULT_RANDOM_PICK_ATTEMPTS,
            rng,
        }
    }

    /// Override the random pick retry bound (minimum 1).
    #[must_use]
    pub fn with_random_attempts(mut self, attempts: usize) -> Self {
        self.random_attempts = attempts.max(1);
        self
    }

    /// Currently selected participant.
    #[must_use]
    pub fn selected(&self) -> Option<&ParticipantId> {
        self.selected.as_ref()
    }

    #[must_use]
    pub fn global_mic_state(&self) -> GlobalMicState {
        self.global
    }

    /// Compute the messages for one key press and update the selection.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::PermissionDenied` unless the local role is
    /// teacher.
    pub fn handle(
        &mut self,
        key: Hotkey,
        roster: &Roster,
    ) -> Result<Vec<SignalMessage>, SignalingError> {
        self.require_host("hotkeys")?;

        let remote = roster.remote_ids();
        let plan = match key {
            Hotkey::Select(index) => match remote.get(index) {
                Some(target) => self.toggle_selection(target.clone()),
                None => {
                    debug!(
                        target: "classroom.dispatcher",
                        index,
                        remote = remote.len(),
                        "No participant at hotkey position"
                    );
                    Vec::new()
                }
            },
            Hotkey::Random => match self.pick_random(&remote) {
                Some(target) => self.toggle_selection(target),
                None => Vec::new(),
            },
            Hotkey::ToggleAll => self.toggle_all(roster),
        };

        Ok(plan)
    }

    /// Messages that end the meeting for `target`, or for every remote
    /// participant when `target` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::PermissionDenied` for non-hosts and
    /// `SignalingError::ParticipantNotFound` for unknown targets.
    pub fn end_meeting(
        &mut self,
        target: Option<&ParticipantId>,
        roster: &Roster,
    ) -> Result<Vec<SignalMessage>, SignalingError> {
        self.require_host("end the meeting")?;

        let targets = match target {
            Some(id) if roster.contains(id) && id != roster.local_id() => vec![id.clone()],
            Some(id) => return Err(SignalingError::ParticipantNotFound(id.to_string())),
            None => roster.remote_ids(),
        };

        if target.is_none() || self.selected.as_ref() == target {
            self.selected = None;
        }

        Ok(targets
            .into_iter()
            .map(|to| control(ControlCommand::EndMeeting, to))
            .collect())
    }

    /// Drop the selection if `id` left the meeting. Publishes nothing.
    pub fn forget(&mut self, id: &ParticipantId) {
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
    }

    fn require_host(&self, action: &str) -> Result<(), SignalingError> {
        if self.role.is_host() {
            Ok(())
        } else {
            Err(SignalingError::PermissionDenied(format!(
                "{} cannot use {action}",
                self.role
            )))
        }
    }

    /// Deselect `target` if it is selected, otherwise move the selection to it.
    fn toggle_selection(&mut self, target: ParticipantId) -> Vec<SignalMessage> {
        if self.selected.as_ref() == Some(&target) {
            self.selected = None;
            return vec![
                control(ControlCommand::Mute, target),
                highlight(HighlightTarget::None),
            ];
        }

        let mut plan = Vec::with_capacity(3);
        if let Some(previous) = self.selected.take() {
            plan.push(control(ControlCommand::Mute, previous));
        }
        plan.push(control(ControlCommand::RequestUnmute, target.clone()));
        plan.push(highlight(HighlightTarget::Participant(target.clone())));
        self.selected = Some(target);
        plan
    }

    /// Random candidate, avoiding the current selection when possible.
    fn pick_random(&mut self, candidates: &[ParticipantId]) -> Option<ParticipantId> {
        match candidates {
            [] => None,
            [only] => Some(only.clone()),
            _ => {
                for _ in 0..self.random_attempts {
                    let index = self.rng.gen_range(0..candidates.len());
                    if let Some(pick) = candidates.get(index) {
                        if self.selected.as_ref() != Some(pick) {
                            return Some(pick.clone());
                        }
                    }
                }
                candidates
                    .iter()
                    .find(|c| self.selected.as_ref() != Some(*c))
                    .cloned()
            }
        }
    }

    fn toggle_all(&mut self, roster: &Roster) -> Vec<SignalMessage> {
        self.global = self.global.toggled();
        let (command, target) = match self.global {
            GlobalMicState::AllMuted => (ControlCommand::Mute, HighlightTarget::None),
            GlobalMicState::AllUnmuted => (ControlCommand::RequestUnmute, HighlightTarget::All),
        };

        let mut plan: Vec<SignalMessage> = roster
            .remote_participants()
            .into_iter()
            .filter(|p| p.role != Role::Teacher)
            .map(|p| control(command, p.id.clone()))
            .collect();
        plan.push(highlight(target));
        plan
    }
}

fn control(command: ControlCommand, to: ParticipantId) -> SignalMessage {
    SignalMessage::Control(ControlMessage::new(command, to))
}

fn highlight(target: HighlightTarget) -> SignalMessage {
    SignalMessage::Highlight(HighlightMessage {
        participant_id: target,
    })
}
