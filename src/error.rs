//! Errors raised by the clustering engine, the wire protocol and the file adapter.

use std::time::Duration;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All the ways a clustering request can fail.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File or socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed delimited input or output file.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A feature field that is not a real number.
    #[error("line {line}, column {column}: cannot parse {value:?} as a number")]
    Parse {
        line: u64,
        column: usize,
        value: String,
    },

    /// Payload that is not a valid encoded message.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// The peer closed the stream before a complete message arrived.
    #[error("stream closed after {received} bytes, before a complete message")]
    Truncated { received: usize },

    /// The peer sent more bytes than the configured message limit.
    #[error("message exceeds the limit of {limit} bytes")]
    MessageTooLarge { limit: usize },

    /// A read or write did not finish within its deadline.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// Clustering parameters that cannot be satisfied by the dataset.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A centroid that cannot be encoded as a JSON number.
    #[error("centroid {cluster} is not finite")]
    NonFinite { cluster: usize },

    /// The server is shutting down.
    #[error("cancelled by shutdown")]
    Cancelled,

    /// The blocking clustering task panicked or was aborted.
    #[error("clustering task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
