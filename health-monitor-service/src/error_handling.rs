//! # Retry Helper
//!
//! A single retry-with-backoff helper parameterized by an attempt limit, a
//! delay schedule, and a transient/non-transient predicate — reused by the
//! Result Processor's two read-then-upsert attempts (§4.6, 100ms/200ms) and
//! the Cache Publisher's write retries (§4.9, 100ms×attempt). Grounded on
//! the teacher's `ErrorHandler::retry_with_backoff`, which retries
//! unconditionally; this version only retries when the caller's predicate
//! says the failure is worth retrying, per §4.6/§4.9/§7.

use std::time::Duration;
use tracing::warn;

/// Retries `operation` up to `delays.len()` additional times (so
/// `delays.len() + 1` attempts total), sleeping `delays[attempt]` between
/// attempts. Stops early and returns the last error if `is_transient`
/// reports `false` for it. Returns the last error if every attempt is
/// exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    delays: &[Duration],
    is_transient: impl Fn(&E) -> bool,
    op_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0usize;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let has_more_attempts = attempt < delays.len();
                if has_more_attempts && is_transient(&err) {
                    warn!(
                        operation = op_name,
                        attempt = attempt + 1,
                        delay_ms = delays[attempt].as_millis() as u64,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delays[attempt]).await;
                    attempt += 1;
                } else {
                    return Err(err);
                }
            }
        }
    }
}

/// The 100ms/200ms schedule the Result Processor uses for its two retried
/// reads (§4.6).
pub fn result_processor_delays() -> Vec<Duration> {
    vec![Duration::from_millis(100), Duration::from_millis(200)]
}

/// The 100ms×attempt schedule the Cache Publisher uses for up to 3
/// attempts (§4.9).
pub fn cache_publisher_delays() -> Vec<Duration> {
    vec![Duration::from_millis(100), Duration::from_millis(200)]
}
