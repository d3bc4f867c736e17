//! Pre-configured test data.
//!
//! - Participant ids and participants with either role
//! - Classrooms (a teacher roster with students in join order)
//! - Raw envelopes with chosen sender, epoch and sequence

use chrono::{Duration, Utc};
use classroom_signaling::messages::{Envelope, SignalMessage};
use classroom_signaling::roster::{Participant, Roster};
use common::types::{ParticipantId, Role};

/// Parse a participant id, panicking on blanks.
#[must_use]
pub fn pid(id: &str) -> ParticipantId {
    ParticipantId::new(id).expect("test participant id must not be blank")
}

#[must_use]
pub fn student(id: &str) -> Participant {
    Participant::new(pid(id), id, Role::Student)
}

#[must_use]
pub fn teacher(id: &str) -> Participant {
    Participant::new(pid(id), id, Role::Teacher)
}

/// Student with a random id, for tests that only need "someone".
#[must_use]
pub fn random_student() -> Participant {
    let id = ParticipantId::random();
    let name = format!("student-{id}");
    Participant::new(id, name, Role::Student)
}

/// Builder for a host roster.
#[derive(Debug, Clone)]
pub struct TestClassroom {
    host: Participant,
    students: Vec<Participant>,
}

impl TestClassroom {
    /// Classroom hosted by a teacher with id `host_id`.
    #[must_use]
    pub fn new(host_id: &str) -> Self {
        Self {
            host: teacher(host_id),
            students: Vec::new(),
        }
    }

    /// Add students. They join one second apart in the order given, so
    /// hotkey positions follow this order.
    #[must_use]
    pub fn with_students<'a>(mut self, ids: impl IntoIterator<Item = &'a str>) -> Self {
        let start = Utc::now() - Duration::hours(1);
        for id in ids {
            let offset = i64::try_from(self.students.len()).unwrap();
            self.students
                .push(student(id).with_joined_at(start + Duration::seconds(offset)));
        }
        self
    }

    #[must_use]
    pub fn host(&self) -> &Participant {
        &self.host
    }

    #[must_use]
    pub fn build(self) -> Roster {
        let mut roster = Roster::new(self.host);
        for student in self.students {
            roster.upsert(student);
        }
        roster
    }
}

/// Builder for envelopes as a remote publisher would send them.
#[derive(Debug, Clone)]
pub struct TestEnvelope {
    sender_id: ParticipantId,
    epoch: i64,
    seq: u64,
}

impl TestEnvelope {
    /// Envelope from `sender` with epoch 1 and sequence 1.
    #[must_use]
    pub fn sent_by(sender: &str) -> Self {
        Self {
            sender_id: pid(sender),
            epoch: 1,
            seq: 1,
        }
    }

    #[must_use]
    pub fn epoch(mut self, epoch: i64) -> Self {
        self.epoch = epoch;
        self
    }

    #[must_use]
    pub fn seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// Wrap a payload.
    #[must_use]
    pub fn message(self, message: impl Into<SignalMessage>) -> Envelope {
        let value = message
            .into()
            .to_value()
            .expect("test payload serializes");
        self.raw(value)
    }

    /// Wrap an arbitrary JSON payload, valid or not.
    #[must_use]
    pub fn raw(self, message: serde_json::Value) -> Envelope {
        Envelope {
            sender_id: self.sender_id,
            epoch: self.epoch,
            seq: self.seq,
            message,
        }
    }
}
