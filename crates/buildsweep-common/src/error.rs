//! Error types for buildsweep

use thiserror::Error;

/// Result type alias for buildsweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Main error type for buildsweep
///
/// Errors raised while a single task unit is being expanded or ingested are
/// recoverable: the pipeline logs them and moves on to the next unit. Errors
/// that mean the run itself is misconfigured are fatal and abort the pass.
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Source unavailable at {url}: {reason}")]
    SourceUnavailable { url: String, reason: String },

    #[error("Malformed response from {url}: {detail}")]
    MalformedResponse { url: String, detail: String },

    #[error("Destination unavailable at {url}: {reason}")]
    DestinationUnavailable { url: String, reason: String },

    #[error("No driver registered for tag '{0}'")]
    DriverNotFound(String),

    #[error("Driver '{driver}' violates its contract: {detail}")]
    DriverContractViolation { driver: String, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SweepError {
    /// Source endpoint could not be reached or answered outside 2xx.
    pub fn source_unavailable(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Source or destination answered with a body that does not decode into
    /// the expected shape.
    pub fn malformed(url: impl Into<String>, detail: impl ToString) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            detail: detail.to_string(),
        }
    }

    /// Destination endpoint could not be reached or answered outside 2xx.
    pub fn destination_unavailable(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::DestinationUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error aborts the whole run instead of skipping one unit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DriverNotFound(_) | Self::DriverContractViolation { .. } | Self::Config(_)
        )
    }
}
