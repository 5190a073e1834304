//! Error types for logcask
//!
//! Provides a unified error type for all store operations.

use thiserror::Error;

/// Result type alias using CaskError
pub type Result<T> = std::result::Result<T, CaskError>;

/// Unified error type for logcask operations
#[derive(Debug, Error)]
pub enum CaskError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    #[error("No record at log offset {offset}")]
    RecordNotFound { offset: u64 },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Malformed index entry at line {line}: {reason}")]
    MalformedIndex { line: usize, reason: String },

    /// The index rewrite failed after the record was appended. The append
    /// has already been rolled back when this is returned.
    #[error("Index update failed: {0}")]
    IndexUpdate(#[source] std::io::Error),

    // -------------------------------------------------------------------------
    // Consistency Errors
    // -------------------------------------------------------------------------
    /// Log and index may disagree. Writes are refused until the index is
    /// rebuilt from the log.
    #[error("Store corrupted: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CaskError {
    /// True for the ordinary "no such key" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, CaskError::KeyNotFound)
    }

    /// True when the store needs an operator-driven rebuild
    pub fn is_corruption(&self) -> bool {
        matches!(self, CaskError::Corruption(_))
    }
}
