//! Polling helpers for state that an actor reaches asynchronously.

use std::future::Future;
use std::time::Duration;

/// How long [`eventually`] keeps polling.
pub const EVENTUALLY_TIMEOUT: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Poll `probe` until it yields `Some`, then return the value.
///
/// # Panics
///
/// Panics with `what` if nothing arrives within [`EVENTUALLY_TIMEOUT`].
pub async fn eventually<T, F, Fut>(what: &str, mut probe: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let poll = async {
        loop {
            if let Some(value) = probe().await {
                return value;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    };

    match tokio::time::timeout(EVENTUALLY_TIMEOUT, poll).await {
        Ok(value) => value,
        Err(_) => panic!("timed out waiting for {what}"),
    }
}
