//! Common data types for classroom components.

use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a participant, as assigned by the real-time SDK.
///
/// The SDK hands out opaque strings, so this is a string newtype rather
/// than a UUID. Serializes transparently as the bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a participant ID, rejecting empty values.
    ///
    /// # Errors
    ///
    /// Returns `CommonError::EmptyIdentifier` if `id` is empty or whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, CommonError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CommonError::EmptyIdentifier("participant_id"));
        }
        Ok(Self(id))
    }

    /// Generate a random participant ID (for local tooling and tests).
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ParticipantId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Role of a participant in the classroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Host of the class; the only role allowed to drive hotkeys.
    Teacher,
    /// Regular attendee.
    Student,
}

impl Role {
    /// Returns the role as a lowercase string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// Whether this role may control other participants.
    #[must_use]
    pub const fn is_host(&self) -> bool {
        matches!(self, Role::Teacher)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(CommonError::InvalidRole(other.to_string())),
        }
    }
}
