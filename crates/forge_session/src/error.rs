//! Error types for session workflows.

use forge_client::ClientError;
use thiserror::Error;

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors reported by the refinement and export workflows.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0} is already in progress")]
    Busy(&'static str),

    #[error("Nothing to send: {0} is empty")]
    EmptyInput(&'static str),

    #[error("Refinement rejected: {0}")]
    RefinementRejected(String),

    #[error("Nothing to export: no files have been generated yet")]
    NothingToExport,

    #[error("Could not save export: {0}")]
    Save(#[from] std::io::Error),

    #[error(transparent)]
    Client(#[from] ClientError),
}
