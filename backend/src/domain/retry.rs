//! Bounded retry for read-modify-write operations that can race.
//!
//! Two requests can race to create the same podcast, or to regroup the same
//! devices. The losing side observes a uniqueness violation or a stale
//! membership check; it re-reads and tries again a bounded number of times
//! before reporting a conflict.

use std::future::Future;

use serde_json::json;
use tracing::warn;

use super::Error;

/// Attempts made when no explicit policy is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How many times a racing operation may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Build a policy; zero is treated as a single attempt.
    #[must_use]
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
        }
    }

    /// Maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The operation finished.
    Complete(T),
    /// The operation lost a race and may be retried.
    Conflict(String),
}

/// Run `attempt` until it completes, fails, or the policy is exhausted.
///
/// Each call receives the 1-based attempt number. Errors returned by the
/// closure are not retried. Exhaustion yields a `conflict` error carrying the
/// last conflict reason.
///
/// # Examples
/// ```
/// use podsync::domain::{Attempt, RetryPolicy, retry_on_conflict};
///
/// # tokio::runtime::Runtime::new().expect("runtime").block_on(async {
/// let value = retry_on_conflict(RetryPolicy::default(), "example", |attempt| async move {
///     if attempt < 2 {
///         Ok(Attempt::Conflict("busy".to_owned()))
///     } else {
///         Ok(Attempt::Complete(attempt))
///     }
/// })
/// .await
/// .expect("second attempt succeeds");
/// assert_eq!(value, 2);
/// # });
/// ```
pub async fn retry_on_conflict<T, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> Result<T, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Attempt<T>, Error>>,
{
    let mut last_reason = String::new();
    for number in 1..=policy.max_attempts() {
        match attempt(number).await? {
            Attempt::Complete(value) => return Ok(value),
            Attempt::Conflict(reason) => {
                warn!(operation, attempt = number, %reason, "write conflict; retrying");
                last_reason = reason;
            }
        }
    }
    Err(
        Error::conflict(format!("{operation} kept conflicting: {last_reason}")).with_details(
            json!({
                "code": "retries_exhausted",
                "attempts": policy.max_attempts(),
            }),
        ),
    )
}
