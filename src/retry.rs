//! Bounded exponential-backoff retry for remote provider calls.
//!
//! Every remote operation in the indexing pipeline goes through
//! [`with_retry`]. The policy is an explicit value handed to the call site,
//! never ambient global state, so the layer stays testable in isolation.
//!
//! Rate-limit cooperation: when the provider signals a primary or secondary
//! rate limit, the matching policy hook decides whether to keep going. A
//! veto surfaces the error immediately; otherwise the wait uses the
//! provider-supplied cooldown when one is present.

use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::{CtxResult, Error, ProviderError};

/// Decision hook consulted on a rate-limit signal.
///
/// Receives the 1-based attempt number and the provider cooldown hint in
/// seconds (if any); returns whether the fetcher should keep retrying.
pub type RateLimitHook = fn(attempt: u32, retry_after_secs: Option<u64>) -> bool;

/// Retry configuration for all remote calls of one indexing pass.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first try).
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Consulted when the provider signals its primary rate limit.
    pub on_rate_limit: RateLimitHook,
    /// Consulted when the provider signals a secondary (burst) rate limit.
    pub on_secondary_rate_limit: RateLimitHook,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            on_rate_limit: keep_retrying,
            on_secondary_rate_limit: keep_retrying,
        }
    }
}

impl RetryPolicy {
    /// Config suitable for quick unit tests (no real waiting).
    pub fn instant() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            ..Self::default()
        }
    }
}

/// Default hook: keep retrying while attempts remain.
fn keep_retrying(_attempt: u32, _retry_after_secs: Option<u64>) -> bool {
    true
}

/// Retry an async operation with exponential backoff.
///
/// Calls `op` up to `policy.max_attempts` times. On each failure, waits the
/// current backoff delay (starting at `initial_delay`, doubling per attempt,
/// capped at `max_delay`) before trying again; the last error is re-raised
/// once attempts are exhausted. Rate-limit errors are routed through the
/// policy hooks first: a `false` answer stops retrying immediately, and an
/// accepted signal waits the provider cooldown instead of the backoff delay.
///
/// `op_name` is carried into the logs so a failing call site is attributable
/// without a debugger.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op_name: &str, mut op: F) -> CtxResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CtxResult<T>>,
{
    let mut delay = policy.initial_delay;
    let mut last_err: Option<Error> = None;

    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(op = op_name, attempt, "retry succeeded");
                }
                return Ok(value);
            }
            Err(err) => {
                // Rate-limit signals consult their hook before any wait.
                let cooldown = match &err {
                    Error::Provider(ProviderError::RateLimited { retry_after_secs }) => {
                        warn!(
                            op = op_name,
                            attempt,
                            retry_after_secs,
                            "provider signalled primary rate limit"
                        );
                        if !(policy.on_rate_limit)(attempt, *retry_after_secs) {
                            return Err(err);
                        }
                        Some(retry_after_secs.map(Duration::from_secs).unwrap_or(delay))
                    }
                    Error::Provider(ProviderError::SecondaryRateLimit { retry_after_secs }) => {
                        warn!(
                            op = op_name,
                            attempt,
                            retry_after_secs,
                            "provider signalled secondary rate limit"
                        );
                        if !(policy.on_secondary_rate_limit)(attempt, *retry_after_secs) {
                            return Err(err);
                        }
                        Some(retry_after_secs.map(Duration::from_secs).unwrap_or(delay))
                    }
                    _ => None,
                };

                if attempt < policy.max_attempts {
                    let wait = cooldown.unwrap_or(delay);
                    warn!(
                        op = op_name,
                        attempt,
                        max = policy.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    delay = delay.saturating_mul(2).min(policy.max_delay);
                } else {
                    warn!(
                        op = op_name,
                        attempt,
                        max = policy.max_attempts,
                        error = %err,
                        "all retry attempts exhausted"
                    );
                }
                last_err = Some(err);
            }
        }
    }

    // The loop always assigns last_err when every attempt fails.
    Err(last_err.expect("retry loop ended without an error"))
}
