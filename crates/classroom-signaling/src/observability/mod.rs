//! Observability for the classroom signaling layer.
//!
//! Metric labels are bounded to prevent cardinality explosion:
//! - `topic`: 4 values (CONTROL, HIGHLIGHT, CHAT, RAISE_HAND)
//! - `command`: 3 values (mute, requestUnmute, endMeeting)
//! - `decision`: 2 values (allowed, denied)
//! - `actor_type`: 2 values (host, participant)
//!
//! Participant ids never appear in labels.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `classroom_messages_published_total` | Counter | `topic` | Envelopes sent |
//! | `classroom_control_commands_total` | Counter | `command` | Control commands sent |
//! | `classroom_publish_failures_total` | Counter | `topic` | Transport rejections |
//! | `classroom_stale_messages_total` | Counter | `topic` | Out-of-order drops |
//! | `classroom_invalid_messages_total` | Counter | `topic` | Schema failures |
//! | `classroom_lagged_messages_total` | Counter | `topic` | Subscriber overflow |
//! | `classroom_mic_failures_total` | Counter | `command` | Local mic errors |
//! | `classroom_admission_decisions_total` | Counter | `decision` | Join requests resolved |
//! | `classroom_actor_messages_processed_total` | Counter | `actor_type` | Actor throughput |
//! | `classroom_actor_mailbox_depth` | Gauge | `actor_type` | Backpressure indicator |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
