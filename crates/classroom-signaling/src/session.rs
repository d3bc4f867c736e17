//! Session-scoped flags.
//!
//! One `SessionFlags` lives for the lifetime of a signed-in session and is
//! shared by `Arc` with everything that needs it. Nothing here is global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// How long a rejoin is suppressed after the host ends the meeting.
pub const DEFAULT_REJOIN_SUPPRESSION: Duration = Duration::from_secs(15);

/// Flags that must survive component re-renders but not a new session.
#[derive(Debug, Default)]
pub struct SessionFlags {
    token_expired_notified: AtomicBool,
    rejoin_suppressed_until: Mutex<Option<Instant>>,
}

impl SessionFlags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the one-shot "session expired" notice.
    ///
    /// Returns true for the first caller only; later callers should not show
    /// the notice again.
    pub fn mark_token_expired_notice(&self) -> bool {
        !self.token_expired_notified.swap(true, Ordering::SeqCst)
    }

    /// Whether the expiry notice was already shown.
    #[must_use]
    pub fn token_expired_notice_shown(&self) -> bool {
        self.token_expired_notified.load(Ordering::SeqCst)
    }

    /// Block automatic rejoin for `duration` from now.
    pub fn suppress_rejoin(&self, duration: Duration) {
        let until = Instant::now() + duration;
        if let Ok(mut guard) = self.rejoin_suppressed_until.lock() {
            *guard = Some(until);
        }
    }

    /// Whether a rejoin attempt should be refused right now.
    #[must_use]
    pub fn is_rejoin_suppressed(&self) -> bool {
        self.rejoin_suppressed_until
            .lock()
            .ok()
            .and_then(|guard| *guard)
            .is_some_and(|until| Instant::now() < until)
    }

    /// Lift any rejoin suppression (explicit user action).
    pub fn clear_rejoin_suppression(&self) {
        if let Ok(mut guard) = self.rejoin_suppressed_until.lock() {
            *guard = None;
        }
    }
}
