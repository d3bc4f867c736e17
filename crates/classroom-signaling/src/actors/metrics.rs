//! Mailbox monitoring for the classroom actors.
//!
//! | Actor Type  | Normal | Warning | Critical |
//! |-------------|--------|---------|----------|
//! | Host        | < 64   | 64-256  | > 256    |
//! | Participant | < 32   | 32-128  | > 128    |
//!
//! Depth is exported as `classroom_actor_mailbox_depth{actor_type}`.

use crate::observability::metrics;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

pub const HOST_MAILBOX_NORMAL: usize = 64;
pub const HOST_MAILBOX_WARNING: usize = 256;

pub const PARTICIPANT_MAILBOX_NORMAL: usize = 32;
pub const PARTICIPANT_MAILBOX_WARNING: usize = 128;

/// Actor type for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// `HostActor` (teacher side).
    Host,
    /// `ParticipantActor` (student side).
    Participant,
}

impl ActorType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorType::Host => "host",
            ActorType::Participant => "participant",
        }
    }

    #[must_use]
    pub const fn warning_threshold(&self) -> usize {
        match self {
            ActorType::Host => HOST_MAILBOX_WARNING,
            ActorType::Participant => PARTICIPANT_MAILBOX_WARNING,
        }
    }

    #[must_use]
    pub const fn normal_threshold(&self) -> usize {
        match self {
            ActorType::Host => HOST_MAILBOX_NORMAL,
            ActorType::Participant => PARTICIPANT_MAILBOX_NORMAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

/// Tracks queued and processed messages for one actor.
///
/// Shared by `Arc` between the handle (enqueue) and the actor (dequeue).
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_type: ActorType,
    actor_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(actor_type: ActorType, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// A message was accepted into the mailbox.
    pub fn record_enqueue(&self) {
        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_depth.fetch_max(depth, Ordering::Relaxed);
        metrics::set_actor_mailbox_depth(self.actor_type.as_str(), depth);

        match self.level_for_depth(depth) {
            MailboxLevel::Critical => warn!(
                target: "classroom.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth,
                threshold = self.actor_type.warning_threshold(),
                "Mailbox depth critical"
            ),
            MailboxLevel::Warning if depth == self.actor_type.normal_threshold() + 1 => debug!(
                target: "classroom.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth,
                "Mailbox depth elevated"
            ),
            _ => {}
        }
    }

    /// A mailbox message was handled.
    pub fn record_dequeue(&self) {
        self.decrement();
        self.record_processed();
    }

    /// An enqueue was recorded but the send failed (mailbox closed).
    pub fn record_send_failed(&self) {
        self.decrement();
    }

    /// A message that did not go through the mailbox (e.g. a topic
    /// subscription) was handled.
    pub fn record_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        metrics::record_actor_message(self.actor_type.as_str());
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        self.level_for_depth(self.current_depth())
    }

    fn decrement(&self) {
        let previous = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| Some(d.saturating_sub(1)))
            .unwrap_or(0);
        metrics::set_actor_mailbox_depth(self.actor_type.as_str(), previous.saturating_sub(1));
    }

    fn level_for_depth(&self, depth: usize) -> MailboxLevel {
        if depth > self.actor_type.warning_threshold() {
            MailboxLevel::Critical
        } else if depth > self.actor_type.normal_threshold() {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}
