//! Test assertion helpers.
//!
//! Polling-based assertions for async test scenarios. Both helpers run on the
//! tokio clock, so they work under `start_paused = true`.

use std::{future::Future, time::Duration};

use tokio::time::{Instant, sleep};

/// Default polling interval for the `eventually` helpers.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls a condition until it returns true or the timeout expires.
///
/// Returns `true` if the condition became true before timeout, `false`
/// otherwise.
///
/// # Example
///
/// ```no_run
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use shardkeeper_test_utils::assert_eventually;
///
/// #[tokio::test]
/// async fn test_async_operation() {
///     let flag = Arc::new(AtomicBool::new(false));
///     let flag_clone = flag.clone();
///
///     tokio::spawn(async move {
///         tokio::time::sleep(Duration::from_millis(50)).await;
///         flag_clone.store(true, Ordering::SeqCst);
///     });
///
///     let result = assert_eventually(Duration::from_millis(200), || {
///         flag.load(Ordering::SeqCst)
///     }).await;
///
///     assert!(result, "flag should be set");
/// }
/// ```
pub async fn assert_eventually<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        sleep(DEFAULT_POLL_INTERVAL).await;
    }

    // Final check after timeout
    condition()
}

/// Like [`assert_eventually`], for conditions that must await, such as reads
/// from a coordination store.
pub async fn eventually_async<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();

    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        sleep(DEFAULT_POLL_INTERVAL).await;
    }

    condition().await
}
