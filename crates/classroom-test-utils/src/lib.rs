//! # Classroom Test Utilities
//!
//! Mocks and fixtures for testing classroom signaling without a real-time
//! SDK.
//!
//! ## Modules
//!
//! - `mock_pubsub` - Pub/sub bus that records every publish and can fail on demand
//! - `mock_sdk` - Microphone, meeting session and entry responder mocks
//! - `fixtures` - Participant, roster and envelope builders
//! - `assertions` - Polling helpers for actor state
//!
//! ## Usage
//!
//! ```rust,ignore
//! use classroom_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let bus = RecordingPubSub::new().with_failing_topic(Topic::Highlight);
//!     let roster = TestClassroom::new("teacher").with_students(["a", "b"]).build();
//!
//!     let mic = MockMic::new();
//!     // Drive the actors, then inspect bus.published_on(Topic::Control)...
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mock_pubsub;
pub mod mock_sdk;

pub use assertions::*;
pub use fixtures::*;
pub use mock_pubsub::*;
pub use mock_sdk::*;
