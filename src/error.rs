//! DriftSync Error Types

use thiserror::Error;

/// Result type alias for DriftSync operations
pub type Result<T> = std::result::Result<T, Error>;

/// DriftSync error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Node errors
    #[error("Connection failed to {address}: {reason}")]
    Connection { address: String, reason: String },

    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    #[error("Fetch failed on {node} for {database}.{collection}: {reason}")]
    Query {
        node: String,
        database: String,
        collection: String,
        reason: String,
    },

    #[error("Replace failed on {node} for {database}.{collection}: {reason}")]
    Write {
        node: String,
        database: String,
        collection: String,
        reason: String,
    },

    // Document errors
    #[error("Malformed document on {node}: {reason}")]
    MalformedDocument { node: String, reason: String },

    // Retry errors
    #[error("Gave up on {operation} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Connection { .. } | Error::ConnectionTimeout(_)
        )
    }

    /// The node a failed operation was addressed to, when known
    pub fn node(&self) -> Option<&str> {
        match self {
            Error::Connection { address, .. } => Some(address),
            Error::ConnectionTimeout(address) => Some(address),
            Error::Query { node, .. } => Some(node),
            Error::Write { node, .. } => Some(node),
            Error::MalformedDocument { node, .. } => Some(node),
            _ => None,
        }
    }
}
