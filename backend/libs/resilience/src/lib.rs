/// Retry with exponential backoff for the Spectra services
///
/// [`with_retry_if`] takes a predicate so errors that will never succeed
/// (a 404, a malformed address) stop the loop on the first attempt.
///
/// # Example: retrying a flaky call
///
/// ```rust,no_run
/// use resilience::{with_retry, RetryConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let result = with_retry(RetryConfig::default(), || async {
///         // Your SMTP or HTTP call here
///         Ok::<_, String>(())
///     })
///     .await;
/// }
/// ```
pub mod retry;

pub use retry::{with_retry, with_retry_if, RetryConfig, RetryError};
