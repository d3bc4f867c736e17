//! Classroom Control Signaling Library
//!
//! In-meeting control layer for a classroom built on a real-time SDK's
//! pub/sub channels:
//!
//! - Host hotkeys that select, mute and unmute students
//! - `CONTROL` commands (`mute`, `requestUnmute`, `endMeeting`) addressed by
//!   participant id
//! - `HIGHLIGHT` broadcasts for the emphasized tile
//! - Host-side admission queue for participants waiting to join
//! - Chat and raise-hand relays
//!
//! # Architecture
//!
//! ```text
//!   keyboard ──► HostActor ──(Publisher)──► PubSub ──► ParticipantActor ──► mic / meeting
//!                  │  ControlDispatcher            │    ControlReceiver
//!                  │  AdmissionQueue               │    HighlightReceiver
//!                  └◄── RAISE_HAND / CHAT ◄────────┘    ChatInbox
//! ```
//!
//! # Ordering
//!
//! The transport is fire-and-forget. Every envelope carries the sender's
//! epoch and a per-topic sequence number, and receivers drop anything older
//! than what they already applied from the same sender, so a delayed `mute`
//! cannot undo a newer `requestUnmute`.
//!
//! # Modules
//!
//! - [`actors`] - Host and participant actors
//! - [`admission`] - Pending join requests
//! - [`chat`], [`hands`] - Chat inbox and raised hands
//! - [`config`] - Console configuration from environment
//! - [`console`] - Console command parsing and simulated devices
//! - [`control`], [`highlight`] - Topic receivers
//! - [`dispatcher`] - Hotkey state machine
//! - [`errors`] - Error types with client-safe messages
//! - [`messages`] - Topic payloads and the envelope
//! - [`observability`] - Metrics and health endpoints
//! - [`pubsub`] - Pub/sub seam, in-process bus and sequencing
//! - [`roster`] - Participant ordering
//! - [`session`] - Session-scoped flags

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod actors;
pub mod admission;
pub mod chat;
pub mod config;
pub mod console;
pub mod control;
pub mod dispatcher;
pub mod errors;
pub mod hands;
pub mod highlight;
pub mod messages;
pub mod observability;
pub mod pubsub;
pub mod roster;
pub mod session;
