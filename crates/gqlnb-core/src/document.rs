//! Notebook document model consumed by the execution pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Language tag of GraphQL code cells.
pub const GRAPHQL_LANGUAGE: &str = "graphql";

/// Language tag of prose cells.
pub const MARKDOWN_LANGUAGE: &str = "markdown";

/// Kind of a notebook cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Executable cell.
    Code,
    /// Prose / markup cell, never executed.
    Markup,
}

/// A single notebook cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Cell kind.
    pub kind: CellKind,
    /// Source text.
    pub source: String,
    /// Language tag (`graphql`, `typescript`, `rust`, `markdown`, ...).
    pub language: String,
}

impl Cell {
    /// Create a GraphQL code cell.
    pub fn code(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Code,
            source: source.into(),
            language: GRAPHQL_LANGUAGE.to_string(),
        }
    }

    /// Create a code cell in another host language.
    pub fn code_in(language: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Code,
            source: source.into(),
            language: language.into(),
        }
    }

    /// Create a markdown cell.
    pub fn markup(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Markup,
            source: source.into(),
            language: MARKDOWN_LANGUAGE.to_string(),
        }
    }

    /// Whether this cell can produce operations.
    pub fn is_executable(&self) -> bool {
        self.kind == CellKind::Code
    }
}

/// An open notebook: its cells plus where it lives on disk.
///
/// The location is what endpoint discovery keys on; it is read-only for the
/// duration of an execution.
#[derive(Debug, Clone, Default)]
pub struct NotebookDocument {
    /// Path of the notebook file.
    pub path: PathBuf,
    /// Ordered cells.
    pub cells: Vec<Cell>,
}

impl NotebookDocument {
    /// Create a document at `path`.
    pub fn new(path: impl AsRef<Path>, cells: Vec<Cell>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cells,
        }
    }

    /// Directory containing the notebook.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    /// Executable cells with their indices.
    pub fn code_cells(&self) -> impl Iterator<Item = (usize, &Cell)> {
        self.cells.iter().enumerate().filter(|(_, c)| c.is_executable())
    }
}
