//! Actors for the two sides of a classroom.
//!
//! ```text
//! HostActor (teacher)                    ParticipantActor (student)
//! ├── roster + hotkey dispatcher   ──►   ├── CONTROL   → ControlReceiver → mic / leave
//! ├── admission queue                    ├── HIGHLIGHT → HighlightReceiver
//! ├── RAISE_HAND ◄──────────────────────  ├── raise hand
//! └── CHAT ◄────────────────────────────► └── CHAT
//! ```
//!
//! - **Message passing**: mailboxes are `tokio::sync::mpsc`, replies are
//!   `tokio::sync::oneshot`
//! - **Run to completion**: each actor handles one mailbox message or topic
//!   delivery at a time; no lock is held across an await
//! - **Cancellation**: each actor owns a `CancellationToken` and exits when
//!   it fires
//! - **Mailbox monitoring**: depth and processed counts per actor type

pub mod host;
pub mod messages;
pub mod metrics;
pub mod participant;

pub use host::{HostActor, HostActorHandle};
pub use messages::*;
pub use metrics::{ActorType, MailboxLevel, MailboxMonitor};
pub use participant::{ParticipantActor, ParticipantActorHandle, ParticipantDeps};
