//! Error types for the storage crate (thiserror-based).

use thiserror::Error;

/// Errors that can occur at the persistence boundary.
///
/// None of these ever reach the commit/undo/redo path: the gateway converts
/// every failure into a `bool` or `Option` at its surface, and editing
/// continues in memory.
#[derive(Error, Debug)]
pub enum StorageError {
    /// File I/O error (read, write, path resolution).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The persistence backend could not be opened.
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    /// A loaded history record fails shape validation.
    #[error("Invalid history record: {reason}")]
    InvalidRecord { reason: String },

    /// A snapshot references a blob id with no stored payload.
    #[error("Missing blob: {id}")]
    BlobMissing { id: String },
}

/// Convenience Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
