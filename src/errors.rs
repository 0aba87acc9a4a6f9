//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Upstream failure worth retrying: network, timeout, 5xx, rate limit.
    Transient(String),
    /// Upstream failure that needs operator intervention: rejected credentials.
    Fatal(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Malformed request parameters.
    Validation(String),
    /// No snapshot has been captured yet.
    NoData(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Whether the poller may retry the failed operation within the same cycle.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Transient(msg) => write!(f, "transient: {msg}"),
            Self::Fatal(msg) => write!(f, "fatal: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::NoData(msg) => write!(f, "no data: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    /// Transport-level failures are always retryable; status handling happens
    /// at the call site where the response code is known.
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Config(format!("invalid upstream request: {err}"))
        } else {
            Self::Transient(format!("upstream request failed: {err}"))
        }
    }
}
