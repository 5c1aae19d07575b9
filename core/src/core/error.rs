//! Error taxonomy for the orchestration fabric.
//!
//! Every public operation in this crate returns `Result<T, CoreError>`.
//! `CoreError` is deliberately flat (one enum, not a tree of wrapped
//! component errors) because every caller-facing boundary — a future HTTP
//! layer, the CLI demo, a test — needs the same two facts about a failure:
//! its taxonomy `code` (for routing: which HTTP status, is it retryable)
//! and a human `message`. Component-level errors (`AgentError`,
//! `WalletError`, ...) stay small and convert into `CoreError` with `From`
//! at the point they cross into orchestration logic.

use thiserror::Error;

/// The ten-way error taxonomy from the fabric's error handling design.
///
/// Each variant maps to exactly one HTTP status via [`CoreError::status_code`]
/// and one retry disposition via [`CoreError::is_retryable`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// Caller sent an ill-formed request: missing field, bad enum, out-of-range buffer.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or invalid credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The authenticated agent is not entitled to perform this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The wallet cannot cover the requested debit.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Amount that was required, in asset minor units.
        required: i128,
        /// Amount actually available, in asset minor units.
        available: i128,
    },

    /// The state machine does not allow this transition from the entity's current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation's deadline has already passed.
    #[error("expired: {0}")]
    Expired(String),

    /// The caller has exceeded its rate limit; retry after `retry_after_ms`.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited {
        /// Milliseconds the caller should wait before retrying.
        retry_after_ms: i64,
    },

    /// A transient failure in an external collaborator (oracle, settlement driver).
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// An unexpected internal failure; always logged with its context.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The HTTP status code a front-end should map this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Validation(_) => 400,
            CoreError::Unauthorized(_) => 401,
            CoreError::Forbidden(_) => 403,
            CoreError::NotFound(_) => 404,
            CoreError::InsufficientBalance { .. } => 402,
            CoreError::Conflict(_) => 409,
            CoreError::Expired(_) => 410,
            CoreError::RateLimited { .. } => 429,
            CoreError::UpstreamUnavailable(_) => 503,
            CoreError::Internal(_) => 500,
        }
    }

    /// The machine-readable taxonomy code, independent of HTTP.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "ValidationError",
            CoreError::Unauthorized(_) => "Unauthorized",
            CoreError::Forbidden(_) => "Forbidden",
            CoreError::NotFound(_) => "NotFound",
            CoreError::InsufficientBalance { .. } => "InsufficientBalance",
            CoreError::Conflict(_) => "Conflict",
            CoreError::Expired(_) => "Expired",
            CoreError::RateLimited { .. } => "RateLimited",
            CoreError::UpstreamUnavailable(_) => "UpstreamUnavailable",
            CoreError::Internal(_) => "Internal",
        }
    }

    /// Whether a caller may retry this exact request without changes.
    ///
    /// Only `RateLimited` (after its `Retry-After`) and `UpstreamUnavailable`
    /// (with backoff) are retryable; every other variant reflects a durable
    /// fact about the request or entity state that retrying won't change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::RateLimited { .. } | CoreError::UpstreamUnavailable(_)
        )
    }
}
