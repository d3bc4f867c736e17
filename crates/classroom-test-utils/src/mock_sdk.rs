//! Mocks for the SDK collaborators: microphone, meeting session and the
//! per-request entry responder.

use async_trait::async_trait;
use classroom_signaling::admission::EntryResponder;
use classroom_signaling::control::{MeetingSession, MicController};
use classroom_signaling::errors::SignalingError;
use common::types::ParticipantId;
use std::sync::{Arc, Mutex};

/// A call made on [`MockMic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicCall {
    Mute,
    Unmute,
}

/// Microphone that records calls and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct MockMic {
    inner: Arc<Mutex<MockMicInner>>,
}

#[derive(Debug, Default)]
struct MockMicInner {
    calls: Vec<MicCall>,
    on: bool,
    fail: bool,
}

impl MockMic {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every mute/unmute fails, e.g. permission denied by the browser.
    #[must_use]
    pub fn failing(self) -> Self {
        self.inner.lock().unwrap().fail = true;
        self
    }

    pub fn calls(&self) -> Vec<MicCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn is_on(&self) -> bool {
        self.inner.lock().unwrap().on
    }

    fn record(&self, call: MicCall) -> Result<(), SignalingError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        if inner.fail {
            return Err(SignalingError::Mic("device unavailable".to_string()));
        }
        inner.on = call == MicCall::Unmute;
        Ok(())
    }
}

#[async_trait]
impl MicController for MockMic {
    async fn mute_mic(&self) -> Result<(), SignalingError> {
        self.record(MicCall::Mute)
    }

    async fn unmute_mic(&self) -> Result<(), SignalingError> {
        self.record(MicCall::Unmute)
    }
}

/// Meeting session that counts leaves and view resets.
#[derive(Debug, Clone, Default)]
pub struct MockMeeting {
    inner: Arc<Mutex<MockMeetingInner>>,
}

#[derive(Debug, Default)]
struct MockMeetingInner {
    leaves: usize,
    view_resets: usize,
    fail_leave: bool,
}

impl MockMeeting {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `leave` returns an error (it is still counted).
    #[must_use]
    pub fn with_leave_failure(self) -> Self {
        self.inner.lock().unwrap().fail_leave = true;
        self
    }

    pub fn leaves(&self) -> usize {
        self.inner.lock().unwrap().leaves
    }

    pub fn view_resets(&self) -> usize {
        self.inner.lock().unwrap().view_resets
    }
}

#[async_trait]
impl MeetingSession for MockMeeting {
    async fn leave(&self) -> Result<(), SignalingError> {
        let mut inner = self.inner.lock().unwrap();
        inner.leaves += 1;
        if inner.fail_leave {
            return Err(SignalingError::Meeting("already left".to_string()));
        }
        Ok(())
    }

    fn reset_view(&self) {
        self.inner.lock().unwrap().view_resets += 1;
    }
}

/// Host decision on an entry request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDecision {
    Allowed,
    Denied,
}

/// Shared log of entry decisions; hands out one responder per request.
#[derive(Debug, Clone, Default)]
pub struct EntryDecisions {
    log: Arc<Mutex<Vec<(ParticipantId, EntryDecision)>>>,
}

impl EntryDecisions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Responder for `id` that records into this log.
    #[must_use]
    pub fn responder(&self, id: &ParticipantId) -> Box<dyn EntryResponder> {
        Box::new(MockResponder {
            id: id.clone(),
            log: Arc::clone(&self.log),
        })
    }

    /// Decisions in the order they were made.
    pub fn all(&self) -> Vec<(ParticipantId, EntryDecision)> {
        self.log.lock().unwrap().clone()
    }

    /// Decisions made for `id`; more than one means a responder was reused.
    pub fn for_participant(&self, id: &ParticipantId) -> Vec<EntryDecision> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(who, _)| who == id)
            .map(|(_, decision)| *decision)
            .collect()
    }
}

/// Entry responder that records its decision.
#[derive(Debug)]
pub struct MockResponder {
    id: ParticipantId,
    log: Arc<Mutex<Vec<(ParticipantId, EntryDecision)>>>,
}

impl EntryResponder for MockResponder {
    fn allow(self: Box<Self>) {
        let MockResponder { id, log } = *self;
        log.lock().unwrap().push((id, EntryDecision::Allowed));
    }

    fn deny(self: Box<Self>) {
        let MockResponder { id, log } = *self;
        log.lock().unwrap().push((id, EntryDecision::Denied));
    }
}
