//! Error types for the benchmark harness

use thiserror::Error;

use crate::graph::GraphError;

/// Errors raised by the record source, the adapters, the collaborator
/// clients and the engine.
///
/// None of them is retried: every error aborts the current stage.
#[derive(Error, Debug)]
pub enum BenchError {
    /// The source record file is missing or unreadable
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// A referenced structure or endpoint id does not resolve
    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    /// A required field is missing or blank on a read-back record
    #[error("Data corruption: {0}")]
    DataCorruption(String),

    /// A traversal returned a record that must not be there
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    /// `begin` was called while a transaction is already open
    #[error("Transaction already open")]
    TransactionAlreadyOpen,

    /// `commit` or `rollback` was called with no open transaction
    #[error("No transaction is open")]
    NoTransaction,

    /// A unique index rejected a value
    #[error("Duplicate key {value:?} on index {index}")]
    DuplicateKey { index: String, value: String },

    /// A statement does not match any supported shape
    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    /// The remote server answered with an error body
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type BenchResult<T> = Result<T, BenchError>;

impl From<GraphError> for BenchError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::VertexNotFound(_)
            | GraphError::EdgeNotFound(_)
            | GraphError::InvalidEdgeSource(_)
            | GraphError::InvalidEdgeTarget(_) => BenchError::ReferenceNotFound(err.to_string()),
            GraphError::DuplicateKey { index, value } => BenchError::DuplicateKey { index, value },
            GraphError::TypeMismatch { .. } | GraphError::UnknownType(_) => {
                BenchError::InvalidStatement(err.to_string())
            }
        }
    }
}

impl From<serde_yaml::Error> for BenchError {
    fn from(err: serde_yaml::Error) -> Self {
        BenchError::Config(err.to_string())
    }
}
