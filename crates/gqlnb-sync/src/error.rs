//! Error types for the notebook format.

use std::path::PathBuf;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while reading or writing notebooks.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Failed to read notebook file.
    #[error("Failed to read file {path}: {message}")]
    ReadError { path: PathBuf, message: String },

    /// Failed to write notebook file.
    #[error("Failed to write file {path}: {message}")]
    WriteError { path: PathBuf, message: String },

    /// Content is not valid JSON.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The top-level `cells` property is absent.
    #[error("Unable to parse provided notebook content, missing required `cells` property.")]
    MissingCells,

    /// `cells` is present but not an array.
    #[error("Unable to parse provided notebook contents, `cells` is not an array.")]
    CellsNotArray,
}
