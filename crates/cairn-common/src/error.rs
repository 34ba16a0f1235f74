//! Error types for Cairn
//!
//! Errors are structured with fields to aid debugging in production.
//! Remote API failures keep their HTTP status code and machine-readable
//! reason so callers can tell a missing object from a throttled or broken
//! API server without matching on messages.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Status reason for a missing object
pub const REASON_NOT_FOUND: &str = "NotFound";
/// Status reason for a server-side failure
pub const REASON_INTERNAL_ERROR: &str = "InternalError";
/// Status reason for a throttled request
pub const REASON_TOO_MANY_REQUESTS: &str = "TooManyRequests";
/// Status reason for a request the caller is not allowed to make
pub const REASON_FORBIDDEN: &str = "Forbidden";
/// Status reason for a malformed request
pub const REASON_BAD_REQUEST: &str = "BadRequest";

const CODE_BAD_REQUEST: u16 = 400;
const CODE_FORBIDDEN: u16 = 403;
const CODE_NOT_FOUND: u16 = 404;
const CODE_TOO_MANY_REQUESTS: u16 = 429;
const CODE_INTERNAL_ERROR: u16 = 500;

/// Main error type for Cairn operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Status error returned by the cluster management API
    #[error("api error [{code} {reason}]: {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Machine-readable reason (e.g., "NotFound", "TooManyRequests")
        reason: String,
        /// Human-readable message from the server
        message: String,
    },

    /// Invalid configuration or request
    #[error("validation error for {context}: {message}")]
    Validation {
        /// What was being validated (e.g., "wait config", "agent config")
        context: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field or environment variable, if known
        field: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "agent", "wait")
        context: String,
    },
}

impl Error {
    /// Create an API status error
    pub fn api(code: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Create a "not found" API error for the named object
    pub fn not_found(kind: &str, name: &str) -> Self {
        Self::api(
            CODE_NOT_FOUND,
            REASON_NOT_FOUND,
            format!("{} \"{}\" not found", kind, name),
        )
    }

    /// Create an internal server error
    pub fn internal_server(msg: impl Into<String>) -> Self {
        Self::api(CODE_INTERNAL_ERROR, REASON_INTERNAL_ERROR, msg)
    }

    /// Create a "too many requests" (throttled) error
    pub fn too_many_requests(msg: impl Into<String>) -> Self {
        Self::api(CODE_TOO_MANY_REQUESTS, REASON_TOO_MANY_REQUESTS, msg)
    }

    /// Create a "forbidden" error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::api(CODE_FORBIDDEN, REASON_FORBIDDEN, msg)
    }

    /// Create a "bad request" error
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::api(CODE_BAD_REQUEST, REASON_BAD_REQUEST, msg)
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            context: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with context and field
    pub fn validation_for_field(
        context: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            context: context.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// HTTP status code of a remote API error, if this is one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Kube {
                source: kube::Error::Api(ae),
            } => Some(ae.code),
            Error::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Machine-readable status reason of a remote API error, if present
    pub fn reason(&self) -> Option<&str> {
        match self {
            Error::Kube {
                source: kube::Error::Api(ae),
            } if !ae.reason.is_empty() => Some(&ae.reason),
            Error::Api { reason, .. } if !reason.is_empty() => Some(reason),
            _ => None,
        }
    }

    /// The requested object does not exist (yet, or any more)
    pub fn is_not_found(&self) -> bool {
        self.matches_status(CODE_NOT_FOUND, REASON_NOT_FOUND)
    }

    /// The server failed while handling an otherwise valid request
    pub fn is_internal_error(&self) -> bool {
        self.matches_status(CODE_INTERNAL_ERROR, REASON_INTERNAL_ERROR)
    }

    /// The server throttled the request
    pub fn is_too_many_requests(&self) -> bool {
        self.matches_status(CODE_TOO_MANY_REQUESTS, REASON_TOO_MANY_REQUESTS)
    }

    /// Check if this error is worth retrying within the same operation
    ///
    /// Only transient server-side conditions qualify; see
    /// [`crate::retry::should_retry`].
    pub fn is_retryable(&self) -> bool {
        crate::retry::should_retry(self).retry
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Validation { context, .. } => Some(context),
            Error::Internal { context, .. } => Some(context),
            _ => None,
        }
    }

    // A known reason wins over the code: servers sometimes pair a generic
    // code with a specific reason.
    fn matches_status(&self, code: u16, reason: &str) -> bool {
        match self.reason() {
            Some(r) => r == reason,
            None => self.status_code() == Some(code),
        }
    }
}
