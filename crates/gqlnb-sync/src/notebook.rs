//! The `.gqlnb` persisted format.
//!
//! ```text
//! { "cells": [ { "code": "<string>", "kind": "code" | "markdown" }, ... ] }
//! ```
//!
//! Serialization is compact JSON with `code` before `kind`. Deserialization is
//! lenient per cell: elements that are not objects, or that lack `code` or
//! `kind`, are skipped. A missing or non-array `cells` is fatal.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use gqlnb_core::{Cell, CellKind};

use crate::error::{SyncError, SyncResult};

/// `kind` value of code cells.
pub const CODE_KIND: &str = "code";

/// `kind` value of markup cells.
pub const MARKDOWN_KIND: &str = "markdown";

/// A cell as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCell {
    pub code: String,
    pub kind: String,
}

impl From<&Cell> for StoredCell {
    fn from(cell: &Cell) -> Self {
        let kind = match cell.kind {
            CellKind::Markup => MARKDOWN_KIND,
            CellKind::Code => CODE_KIND,
        };
        Self {
            code: cell.source.clone(),
            kind: kind.to_string(),
        }
    }
}

impl From<StoredCell> for Cell {
    fn from(stored: StoredCell) -> Self {
        if stored.kind == CODE_KIND {
            Cell::code(stored.code)
        } else {
            Cell::markup(stored.code)
        }
    }
}

#[derive(Serialize)]
struct StoredNotebook<'a> {
    cells: &'a [StoredCell],
}

/// The document a "new notebook" command creates: one empty GraphQL cell.
pub fn create_new() -> Vec<Cell> {
    vec![Cell::code("")]
}

/// Serialize cells to the persisted format.
pub fn serialize(cells: &[Cell]) -> SyncResult<Vec<u8>> {
    let stored: Vec<StoredCell> = cells.iter().map(StoredCell::from).collect();
    Ok(serde_json::to_vec(&StoredNotebook { cells: &stored })?)
}

/// Deserialize cells from the persisted format.
///
/// Zero-length input yields the same cells as `create_new`.
pub fn deserialize(content: &[u8]) -> SyncResult<Vec<Cell>> {
    if content.is_empty() {
        return Ok(create_new());
    }

    let data: Value = serde_json::from_slice(content)?;
    let cells = data.get("cells").ok_or(SyncError::MissingCells)?;
    let Value::Array(cells) = cells else {
        return Err(SyncError::CellsNotArray);
    };

    let total = cells.len();
    let parsed: Vec<Cell> = cells.iter().filter_map(parse_cell).map(Cell::from).collect();

    if parsed.len() < total {
        tracing::warn!(skipped = total - parsed.len(), "skipped malformed notebook cells");
    }
    Ok(parsed)
}

fn parse_cell(value: &Value) -> Option<StoredCell> {
    let object = value.as_object()?;
    let code = object.get("code")?;
    let kind = object.get("kind")?;

    Some(StoredCell {
        code: as_text(code),
        kind: kind.as_str().unwrap_or_default().to_string(),
    })
}

/// Text of a `code` value; non-strings keep their JSON rendering.
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
