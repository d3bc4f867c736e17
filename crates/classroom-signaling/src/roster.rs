//! Local view of the meeting's participants.
//!
//! The SDK owns participant lifecycle; the roster mirrors the fields the
//! signaling layer needs and provides the deterministic ordering used for
//! hotkey indexing: by join time, then by id.

use chrono::{DateTime, Utc};
use common::types::{ParticipantId, Role};
use std::collections::HashMap;

/// A participant as seen by the signaling layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// Create a participant that joined now.
    #[must_use]
    pub fn new(id: ParticipantId, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role,
            joined_at: Utc::now(),
        }
    }

    /// Override the join timestamp.
    #[must_use]
    pub fn with_joined_at(mut self, joined_at: DateTime<Utc>) -> Self {
        self.joined_at = joined_at;
        self
    }
}

/// Participants keyed by id, plus the local participant's id.
#[derive(Debug, Clone)]
pub struct Roster {
    local_id: ParticipantId,
    participants: HashMap<ParticipantId, Participant>,
}

impl Roster {
    /// Create a roster containing only the local participant.
    #[must_use]
    pub fn new(local: Participant) -> Self {
        let local_id = local.id.clone();
        let mut participants = HashMap::new();
        participants.insert(local_id.clone(), local);
        Self {
            local_id,
            participants,
        }
    }

    /// Id of the local participant.
    #[must_use]
    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    /// Role of the local participant.
    #[must_use]
    pub fn local_role(&self) -> Option<Role> {
        self.participants.get(&self.local_id).map(|p| p.role)
    }

    /// Insert a participant, or refresh the name and role of one already
    /// present. A known participant keeps its original join time, so a
    /// repeated join does not move it in hotkey order.
    ///
    /// Returns true if it was not present.
    pub fn upsert(&mut self, participant: Participant) -> bool {
        match self.participants.get_mut(&participant.id) {
            Some(existing) => {
                existing.display_name = participant.display_name;
                existing.role = participant.role;
                false
            }
            None => {
                self.participants.insert(participant.id.clone(), participant);
                true
            }
        }
    }

    /// Remove a participant. The local participant cannot be removed.
    pub fn remove(&mut self, id: &ParticipantId) -> Option<Participant> {
        if id == &self.local_id {
            return None;
        }
        self.participants.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.participants.contains_key(id)
    }

    /// Total participants including the local one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Always false: the local participant is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Everyone except the local participant, ordered by join time then id.
    #[must_use]
    pub fn remote_participants(&self) -> Vec<&Participant> {
        let mut remote: Vec<&Participant> = self
            .participants
            .values()
            .filter(|p| p.id != self.local_id)
            .collect();
        remote.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
        remote
    }

    /// Ids of [`Roster::remote_participants`], same order.
    #[must_use]
    pub fn remote_ids(&self) -> Vec<ParticipantId> {
        self.remote_participants()
            .into_iter()
            .map(|p| p.id.clone())
            .collect()
    }
}
