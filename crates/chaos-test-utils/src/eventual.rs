//! Eventual consistency helpers for timing-dependent tests.
//!
//! The scheduler runs in a background task, so tests observe its effects by
//! polling. Delays use `tokio::time`, which makes these helpers advance
//! instantly under a paused test clock.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Initial delay between polls.
const INITIAL_DELAY: Duration = Duration::from_millis(10);

/// Upper bound for a single poll delay.
const MAX_DELAY: Duration = Duration::from_millis(250);

/// Assert that a condition becomes true within `timeout`.
///
/// Polls with exponential backoff: 10ms initial delay, 2x multiplier, each
/// delay capped at 250ms and at the remaining time.
///
/// # Example
///
/// ```no_run
/// use chaos_test_utils::eventual::assert_eventually;
/// use std::time::Duration;
///
/// # async fn example(cluster: chaos_test_utils::FakeCluster) {
/// assert_eventually(Duration::from_secs(1), || {
///     let cluster = cluster.clone();
///     async move { cluster.pods_in("namespace1").len() == 3 }
/// })
/// .await
/// .expect("two pods should be deleted within a second");
/// # }
/// ```
pub async fn assert_eventually<F, Fut>(timeout: Duration, mut condition: F) -> Result<(), String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let mut delay = INITIAL_DELAY;
    let start = Instant::now();

    loop {
        if condition().await {
            return Ok(());
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(format!("Condition not met within {:?}", timeout));
        }

        sleep(delay.min(timeout.saturating_sub(elapsed))).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}
