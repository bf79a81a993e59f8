/// Resilience primitives shared by the event bus and the cache layer
///
/// - **Retry**: bounded retry loop driven by a backoff policy object
///   (fixed or exponential delay, optional jitter)
/// - **Timeout**: time limits for calls that must never block the caller
///
/// # Example: fixed-delay reconnect policy
///
/// ```rust,no_run
/// use resilience::{with_retry, RetryConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let policy = RetryConfig::fixed(10, Duration::from_secs(5));
///
///     let result = with_retry(&policy, || async {
///         // open a broker connection here
///         Ok::<_, String>(())
///     })
///     .await;
/// }
/// ```

pub mod retry;
pub mod timeout;

pub use retry::{with_retry, with_retry_if, RetryConfig, RetryError};
pub use timeout::{with_timeout, TimeoutError};
