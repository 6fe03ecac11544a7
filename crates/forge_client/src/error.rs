//! Error types for the client module.

use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Why a network-level attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFailure {
    /// The attempt exceeded its wall-clock budget and was cancelled.
    Timeout,
    /// DNS, connection refused, reset, or a body that could not be read.
    Transport,
}

/// Classified errors surfaced by the request executor.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("Missing configuration: {0}")]
    Configuration(String),

    #[error("Network error ({kind:?}): {message}")]
    Network {
        kind: NetworkFailure,
        message: String,
    },

    #[error("Service error {status}: {detail}")]
    Service { status: u16, detail: String },

    #[error("Unexpected response: {0}")]
    Data(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Network {
            kind: NetworkFailure::Timeout,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Network {
            kind: NetworkFailure::Transport,
            message: message.into(),
        }
    }

    /// Network and service failures are worth another attempt; everything
    /// else is either local or deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Service { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Network {
                kind: NetworkFailure::Timeout,
                ..
            }
        )
    }

    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Network { .. } => "network",
            Self::Service { .. } => "service",
            Self::Data(_) => "data",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Data(err.to_string())
    }
}
