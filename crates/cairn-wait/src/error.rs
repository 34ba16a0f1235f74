//! Outcome errors for condition waits
//!
//! A wait fails in one of four distinguishable ways. Callers branch on the
//! variant (or on [`WaitError::is_timeout`]), never on the message text.

use std::fmt;
use std::time::Duration;

use cairn_common::Error;
use thiserror::Error;

/// Problem reported by a condition while evaluating a snapshot
///
/// Raised for domain-level failures such as a failed restore. It does not by
/// itself end a wait.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ConditionError {
    message: String,
}

impl ConditionError {
    /// Create a condition error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Human-readable description
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A wait ran out of time after observing the object at least once
///
/// Always carries the most recent successful observation so the caller can
/// report what state the object was actually in.
pub struct TimeoutError<T> {
    message: String,
    last_observed: Box<T>,
    elapsed: Duration,
    attempts: u32,
}

impl<T> TimeoutError<T> {
    pub(crate) fn new(
        message: impl Into<String>,
        last_observed: T,
        elapsed: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            message: message.into(),
            last_observed: Box::new(last_observed),
            elapsed,
            attempts,
        }
    }

    /// Human-readable message naming the action that timed out
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Last snapshot observed before the deadline
    pub fn last_observed(&self) -> &T {
        &self.last_observed
    }

    /// Take ownership of the last snapshot
    pub fn into_last_observed(self) -> T {
        *self.last_observed
    }

    /// Time spent waiting
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Number of fetch attempts made
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl<T> fmt::Display for TimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl<T: fmt::Debug> fmt::Debug for TimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutError")
            .field("message", &self.message)
            .field("last_observed", &self.last_observed)
            .field("elapsed", &self.elapsed)
            .field("attempts", &self.attempts)
            .finish()
    }
}

impl<T: fmt::Debug> std::error::Error for TimeoutError<T> {}

/// Why a wait did not complete
#[derive(Debug, Error)]
pub enum WaitError<T> {
    /// Deadline expired; carries the last observed snapshot
    #[error("{0}")]
    Timeout(TimeoutError<T>),

    /// A fetch failed with a terminal error
    #[error("error while {action}: {source}")]
    Fetch {
        /// What was being waited for
        action: String,
        /// The terminal fetch error
        #[source]
        source: Error,
    },

    /// Deadline expired without a single successful observation
    #[error("timed out while {action}: no object observed")]
    NothingObserved {
        /// What was being waited for
        action: String,
        /// The transient error seen on the final attempt, if it failed
        #[source]
        last_error: Option<Error>,
    },

    /// The wait was cancelled from outside
    #[error("cancelled while {action}")]
    Cancelled {
        /// What was being waited for
        action: String,
        /// Last snapshot observed before cancellation, if any
        last_observed: Option<Box<T>>,
    },
}

impl<T> WaitError<T> {
    /// True only for a deadline expiry that observed the object
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout(_))
    }

    /// True if the wait was cancelled externally
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitError::Cancelled { .. })
    }

    /// The timeout details, if this is a timeout
    pub fn as_timeout(&self) -> Option<&TimeoutError<T>> {
        match self {
            WaitError::Timeout(t) => Some(t),
            _ => None,
        }
    }

    /// Last snapshot observed before the wait ended, if any
    pub fn last_observed(&self) -> Option<&T> {
        match self {
            WaitError::Timeout(t) => Some(t.last_observed()),
            WaitError::Cancelled { last_observed, .. } => last_observed.as_deref(),
            _ => None,
        }
    }

    /// Take ownership of the last snapshot, if any
    pub fn into_last_observed(self) -> Option<T> {
        match self {
            WaitError::Timeout(t) => Some(t.into_last_observed()),
            WaitError::Cancelled { last_observed, .. } => last_observed.map(|b| *b),
            _ => None,
        }
    }

    /// The underlying fetch error for terminal failures
    pub fn fetch_error(&self) -> Option<&Error> {
        match self {
            WaitError::Fetch { source, .. } => Some(source),
            WaitError::NothingObserved { last_error, .. } => last_error.as_ref(),
            _ => None,
        }
    }
}
