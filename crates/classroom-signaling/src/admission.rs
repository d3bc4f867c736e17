//! Host-side queue of pending join requests.
//!
//! The SDK surfaces each waiting participant with a responder that can be
//! used exactly once. The queue keeps them in arrival order until the host
//! decides; decisions are terminal and there is no timeout.

use crate::errors::SignalingError;
use crate::observability::metrics;

use common::types::ParticipantId;
use std::collections::VecDeque;
use tracing::{debug, info};

/// One-shot decision handle for a pending entry request.
///
/// Consuming `self` makes a second decision on the same request
/// unrepresentable.
pub trait EntryResponder: Send {
    fn allow(self: Box<Self>);
    fn deny(self: Box<Self>);
}

/// Adapts a pair of closures into an [`EntryResponder`].
pub struct FnResponder<A, D> {
    on_allow: A,
    on_deny: D,
}

impl<A, D> FnResponder<A, D>
where
    A: FnOnce() + Send + 'static,
    D: FnOnce() + Send + 'static,
{
    pub fn new(on_allow: A, on_deny: D) -> Self {
        Self { on_allow, on_deny }
    }
}

impl<A, D> EntryResponder for FnResponder<A, D>
where
    A: FnOnce() + Send + 'static,
    D: FnOnce() + Send + 'static,
{
    fn allow(self: Box<Self>) {
        (self.on_allow)();
    }

    fn deny(self: Box<Self>) {
        (self.on_deny)();
    }
}

/// What the host UI renders for a waiting participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub id: ParticipantId,
    pub name: String,
}

struct PendingRequest {
    entry: PendingEntry,
    responder: Box<dyn EntryResponder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Allow,
    Deny,
}

impl Decision {
    const fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "allowed",
            Decision::Deny => "denied",
        }
    }

    fn apply(self, responder: Box<dyn EntryResponder>) {
        match self {
            Decision::Allow => responder.allow(),
            Decision::Deny => responder.deny(),
        }
    }
}

/// Pending join requests in arrival order.
#[derive(Default)]
pub struct AdmissionQueue {
    pending: VecDeque<PendingRequest>,
}

impl std::fmt::Debug for AdmissionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

impl AdmissionQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queue a request.
    ///
    /// A second request for an id that is still pending replaces the first
    /// in place; the older responder is dropped undecided.
    pub fn request(
        &mut self,
        id: ParticipantId,
        name: impl Into<String>,
        responder: Box<dyn EntryResponder>,
    ) {
        let request = PendingRequest {
            entry: PendingEntry {
                id,
                name: name.into(),
            },
            responder,
        };

        if let Some(existing) = self
            .pending
            .iter_mut()
            .find(|r| r.entry.id == request.entry.id)
        {
            debug!(
                target: "classroom.admission",
                participant_id = %request.entry.id,
                "Replacing duplicate entry request"
            );
            *existing = request;
            return;
        }

        info!(
            target: "classroom.admission",
            participant_id = %request.entry.id,
            name = %request.entry.name,
            pending = self.pending.len() + 1,
            "Entry requested"
        );
        self.pending.push_back(request);
    }

    /// Admit one waiting participant.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::ParticipantNotFound` if `id` is not pending.
    pub fn allow(&mut self, id: &ParticipantId) -> Result<(), SignalingError> {
        self.decide(id, Decision::Allow)
    }

    /// Reject one waiting participant.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::ParticipantNotFound` if `id` is not pending.
    pub fn deny(&mut self, id: &ParticipantId) -> Result<(), SignalingError> {
        self.decide(id, Decision::Deny)
    }

    /// Admit everyone waiting. Returns how many were admitted.
    pub fn allow_all(&mut self) -> usize {
        self.decide_all(Decision::Allow)
    }

    /// Reject everyone waiting. Returns how many were rejected.
    pub fn deny_all(&mut self) -> usize {
        self.decide_all(Decision::Deny)
    }

    /// Snapshot of waiting participants, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingEntry> {
        self.pending.iter().map(|r| r.entry.clone()).collect()
    }

    fn decide(&mut self, id: &ParticipantId, decision: Decision) -> Result<(), SignalingError> {
        let index = self
            .pending
            .iter()
            .position(|r| &r.entry.id == id)
            .ok_or_else(|| SignalingError::ParticipantNotFound(id.to_string()))?;
        let request = self
            .pending
            .remove(index)
            .ok_or_else(|| SignalingError::ParticipantNotFound(id.to_string()))?;

        info!(
            target: "classroom.admission",
            participant_id = %id,
            decision = decision.as_str(),
            "Entry decided"
        );
        decision.apply(request.responder);
        metrics::record_admission(decision.as_str(), 1);
        Ok(())
    }

    fn decide_all(&mut self, decision: Decision) -> usize {
        if self.pending.is_empty() {
            return 0;
        }

        // Take the whole queue first so the queue is empty even if a
        // responder re-enters with a new request.
        let drained = std::mem::take(&mut self.pending);
        let count = drained.len();
        for request in drained {
            decision.apply(request.responder);
        }

        info!(
            target: "classroom.admission",
            decision = decision.as_str(),
            count = count,
            "Bulk entry decision"
        );
        metrics::record_admission(decision.as_str(), count);
        count
    }
}
