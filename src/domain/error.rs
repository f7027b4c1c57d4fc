//! Domain-level error types for tg-export.
//!
//! All errors are typed with `thiserror`. Pre-flight failures (`Config`,
//! `Resolution`) happen before any remote or log interaction; in-flight
//! failures leave the export log exactly as far as it was appended.

use std::time::Duration;

use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing credentials, missing session, or invalid configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The chat locator could not be turned into a chat reference.
    #[error("Invalid chat locator '{locator}': {message}")]
    Resolution { locator: String, message: String },

    /// The remote service asked us to back off.
    #[error("Rate limited by remote service, retry after {}s", wait.as_secs())]
    RateLimited { wait: Duration },

    /// Any other remote failure; aborts the current run.
    #[error("Remote fetch failed: {message}")]
    RemoteFetch {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The remote returned an identifier that does not continue the run's order.
    #[error("Non-monotonic message id {got} after {previous}")]
    NonMonotonicId { previous: i64, got: i64 },

    /// The run was stopped by shutdown before it completed.
    #[error("Export cancelled after {written} messages")]
    Cancelled { written: u64 },

    /// A second export was requested while one is still running.
    #[error("Export already running")]
    JobAlreadyRunning,

    /// Invalid data in a log or input file.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a resolution error for a locator.
    pub fn resolution(locator: &str, message: impl Into<String>) -> Self {
        Self::Resolution {
            locator: locator.to_string(),
            message: message.into(),
        }
    }

    /// Create a remote fetch error without an underlying source.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteFetch {
            message: message.into(),
            source: None,
        }
    }

    /// Create a remote fetch error from a transport error.
    pub fn transport(err: reqwest::Error) -> Self {
        Self::RemoteFetch {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Wait duration if this is a rate-limit signal.
    #[must_use]
    pub const fn rate_limit_wait(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { wait } => Some(*wait),
            _ => None,
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_wait() {
        let err = AppError::RateLimited {
            wait: Duration::from_secs(42),
        };
        assert_eq!(err.rate_limit_wait(), Some(Duration::from_secs(42)));
        assert_eq!(err.to_string(), "Rate limited by remote service, retry after 42s");
        assert!(AppError::remote("boom").rate_limit_wait().is_none());
    }
}
