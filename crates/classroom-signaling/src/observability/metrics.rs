//! Metric recording helpers.
//!
//! All metrics use the `classroom_` prefix and `_total` suffix for counters.

use crate::messages::{ControlCommand, SignalMessage, Topic};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return the handle used by `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Record a successfully published envelope.
///
/// Metrics: `classroom_messages_published_total{topic}` and, for control
/// payloads, `classroom_control_commands_total{command}`.
pub fn record_published(message: &SignalMessage) {
    counter!("classroom_messages_published_total", "topic" => message.topic().as_str())
        .increment(1);
    if let SignalMessage::Control(control) = message {
        counter!("classroom_control_commands_total", "command" => control.command.as_str())
            .increment(1);
    }
}

/// Record a publish rejected by the transport.
pub fn record_publish_failure(topic: Topic) {
    counter!("classroom_publish_failures_total", "topic" => topic.as_str()).increment(1);
}

/// Record an envelope dropped because a newer one was already applied.
pub fn record_stale(topic: Topic) {
    counter!("classroom_stale_messages_total", "topic" => topic.as_str()).increment(1);
}

/// Record a payload that failed schema validation.
pub fn record_invalid(topic: Topic) {
    counter!("classroom_invalid_messages_total", "topic" => topic.as_str()).increment(1);
}

/// Record envelopes lost to subscriber lag.
pub fn record_lagged(topic: Topic, skipped: u64) {
    counter!("classroom_lagged_messages_total", "topic" => topic.as_str()).increment(skipped);
}

/// Record a failed local mic operation.
pub fn record_mic_failure(command: ControlCommand) {
    counter!("classroom_mic_failures_total", "command" => command.as_str()).increment(1);
}

/// Record resolved join requests.
///
/// `decision` is `"allowed"` or `"denied"`.
pub fn record_admission(decision: &'static str, count: usize) {
    counter!("classroom_admission_decisions_total", "decision" => decision)
        .increment(u64::try_from(count).unwrap_or(u64::MAX));
}

/// Record one mailbox or subscription message handled by an actor.
pub fn record_actor_message(actor_type: &'static str) {
    counter!("classroom_actor_messages_processed_total", "actor_type" => actor_type).increment(1);
}

/// Set the mailbox depth for an actor type.
pub fn set_actor_mailbox_depth(actor_type: &'static str, depth: usize) {
    // usize to f64 conversion is safe for realistic mailbox depths
    #[allow(clippy::cast_precision_loss)]
    gauge!("classroom_actor_mailbox_depth", "actor_type" => actor_type).set(depth as f64);
}
