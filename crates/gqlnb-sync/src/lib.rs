//! Notebook file format for GraphQL notebooks.
//!
//! Reads and writes `.gqlnb` files and converts them to the in-memory
//! `NotebookDocument` used by the execution engine.
//!
//! # Architecture
//!
//! ```text
//! notebook.gqlnb ──► deserialize ──► Vec<Cell> ──► NotebookDocument ──► gqlnb-core
//!        ▲                                                  │
//!        └────────────── serialize ◄────────────────────────┘
//! ```

mod error;
mod notebook;

pub use error::{SyncError, SyncResult};
pub use notebook::{CODE_KIND, MARKDOWN_KIND, StoredCell, create_new, deserialize, serialize};

use std::fs;
use std::path::{Path, PathBuf};

use gqlnb_core::NotebookDocument;

/// File extension of GraphQL notebooks.
pub const NOTEBOOK_EXTENSION: &str = "gqlnb";

/// Read a notebook file.
pub fn read_notebook(path: impl AsRef<Path>) -> SyncResult<NotebookDocument> {
    let path = path.as_ref();
    let content = fs::read(path).map_err(|e| SyncError::ReadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let cells = deserialize(&content)?;
    tracing::debug!("Read {} ({} cells)", path.display(), cells.len());
    Ok(NotebookDocument::new(path, cells))
}

/// Write a notebook file.
pub fn write_notebook(document: &NotebookDocument) -> SyncResult<()> {
    let bytes = serialize(&document.cells)?;
    fs::write(&document.path, bytes).map_err(|e| SyncError::WriteError {
        path: document.path.clone(),
        message: e.to_string(),
    })?;

    tracing::info!(
        "Wrote {} ({} cells)",
        document.path.display(),
        document.cells.len()
    );
    Ok(())
}

/// Create a new notebook file with one empty GraphQL cell.
///
/// Refuses to overwrite an existing file.
pub fn create_notebook(path: impl AsRef<Path>) -> SyncResult<NotebookDocument> {
    let path = path.as_ref();
    if path.exists() {
        return Err(SyncError::WriteError {
            path: path.to_path_buf(),
            message: "file already exists".to_string(),
        });
    }

    let document = NotebookDocument::new(path, create_new());
    write_notebook(&document)?;
    Ok(document)
}

/// Add the notebook extension if the path has none.
pub fn notebook_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(NOTEBOOK_EXTENSION)
    }
}
