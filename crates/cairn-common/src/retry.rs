//! Retry classification for remote read failures.
//!
//! Decides whether an error returned while observing a remote object is a
//! transient server-side condition (keep polling) or a terminal fault (stop
//! now). The decision is a pure function of the error value; sleeping for
//! the suggested delay is the caller's job.
//!
//! "Not found" is deliberately *not* retryable here. Whether a missing object
//! means "not created yet", "already deleted" or "wrong name" depends on
//! what the caller is waiting for, so callers handle it before classifying.
//!
//! # Example
//!
//! ```ignore
//! use cairn_common::retry::should_retry;
//!
//! let decision = should_retry(&err);
//! if decision.retry {
//!     tokio::time::sleep(decision.delay).await;
//! }
//! ```

use std::time::Duration;

use crate::Error;

/// Outcome of classifying a single error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether the failed operation should be attempted again
    pub retry: bool,
    /// Suggested pause before the next attempt
    pub delay: Duration,
}

impl RetryDecision {
    /// Retry after the given delay
    pub const fn retry_after(delay: Duration) -> Self {
        Self { retry: true, delay }
    }

    /// Do not retry
    pub const fn give_up() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }
}

/// Decide whether to retry a remote read, optionally after a delay.
///
/// Internal server errors and throttling are transient. Everything else,
/// including "not found" and all client-side errors, is terminal.
pub fn should_retry(err: &Error) -> RetryDecision {
    if err.is_internal_error() || err.is_too_many_requests() {
        return RetryDecision::retry_after(Duration::ZERO);
    }
    RetryDecision::give_up()
}
