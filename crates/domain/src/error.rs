//! Internal error taxonomy.
//!
//! Distinct from the wire-level error `code` field emitted on SSE `error`
//! events (see `sse::SseError`) — that taxonomy is a projection of this
//! one onto the handful of kinds a client is allowed to see.

/// Shared error type used across the review-gateway crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("validation: {0}")]
    Validation(String),

    #[error("rate limit: {0}")]
    RateLimit(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session busy: {0}")]
    SessionBusy(String),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Project this internal error onto the wire-level taxonomy's stable
    /// `code` string (see `sse::ErrorCode`).
    pub fn wire_code(&self) -> &'static str {
        match self {
            Error::Config(_) => "configuration",
            Error::Validation(_) => "validation",
            Error::RateLimit(_) => "rate-limit",
            Error::Timeout(_) => "timeout",
            Error::Cancelled => "cancellation",
            Error::Provider { .. } | Error::Http(_) | Error::Json(_) => "upstream",
            Error::SessionNotFound(_) | Error::SessionBusy(_) => "validation",
            Error::Io(_) | Error::Auth(_) | Error::Other(_) => "internal",
        }
    }
}
