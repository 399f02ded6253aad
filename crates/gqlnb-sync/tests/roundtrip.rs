//! Integration tests for notebook persistence.
//!
//! Tests round-trips through the persisted format and the file helpers.

use std::fs;

use gqlnb_core::{Cell, CellKind, NotebookDocument};
use gqlnb_sync::{
    SyncError, create_new, create_notebook, deserialize, read_notebook, serialize, write_notebook,
};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Create a temporary directory for test artifacts.
fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Compare the persisted content of two cell lists.
fn assert_content_equivalent(left: &[Cell], right: &[Cell]) {
    assert_eq!(left.len(), right.len(), "cell count differs");
    for (l, r) in left.iter().zip(right) {
        assert_eq!(l.source, r.source);
        assert_eq!(l.kind, r.kind);
    }
}

fn sample_cells() -> Vec<Cell> {
    vec![
        Cell::markup("# Users API\nQueries against the users service."),
        Cell::code("query User($id: ID!) {\n  user(id: $id) { name }\n}"),
        Cell::code(""),
        Cell::markup(""),
        Cell::code("subscription { tick }\n\n\"\"\"unicode: 你好 🚀\"\"\"\n"),
        Cell::code_in("typescript", "const q = gql`{ me { id } }`;"),
    ]
}

// =============================================================================
// Round-trip
// =============================================================================

#[test]
fn test_roundtrip_preserves_content() {
    let cells = sample_cells();
    let restored = deserialize(&serialize(&cells).unwrap()).unwrap();
    assert_content_equivalent(&cells, &restored);
}

#[test]
fn test_roundtrip_zero_cells() {
    let restored = deserialize(&serialize(&[]).unwrap()).unwrap();
    assert!(restored.is_empty());
}

#[test]
fn test_roundtrip_is_stable() {
    let first = serialize(&sample_cells()).unwrap();
    let second = serialize(&deserialize(&first).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_code_cells_come_back_as_graphql() {
    let restored = deserialize(&serialize(&sample_cells()).unwrap()).unwrap();
    for cell in restored {
        match cell.kind {
            CellKind::Code => assert_eq!(cell.language, "graphql"),
            CellKind::Markup => assert_eq!(cell.language, "markdown"),
        }
    }
}

#[test]
fn test_empty_input_equals_new_document() {
    let from_empty = deserialize(&[]).unwrap();
    let new = create_new();
    assert_eq!(from_empty, new);

    let via_bytes = deserialize(&serialize(&new).unwrap()).unwrap();
    assert_eq!(via_bytes, new);
}

// =============================================================================
// Files
// =============================================================================

#[test]
fn test_write_then_read() {
    let dir = temp_dir();
    let path = dir.path().join("api.gqlnb");
    let document = NotebookDocument::new(&path, sample_cells());

    write_notebook(&document).unwrap();
    let restored = read_notebook(&path).unwrap();

    assert_eq!(restored.path, path);
    assert_content_equivalent(&document.cells, &restored.cells);
}

#[test]
fn test_read_empty_file_is_new_document() {
    let dir = temp_dir();
    let path = dir.path().join("empty.gqlnb");
    fs::write(&path, "").unwrap();

    let document = read_notebook(&path).unwrap();
    assert_eq!(document.cells, create_new());
}

#[test]
fn test_read_missing_file() {
    let dir = temp_dir();
    let err = read_notebook(dir.path().join("missing.gqlnb")).unwrap_err();
    assert!(matches!(err, SyncError::ReadError { .. }));
}

#[test]
fn test_read_file_without_cells() {
    let dir = temp_dir();
    let path = dir.path().join("bad.gqlnb");
    fs::write(&path, r#"{"notebook": []}"#).unwrap();

    assert!(matches!(read_notebook(&path), Err(SyncError::MissingCells)));
}

#[test]
fn test_create_notebook() {
    let dir = temp_dir();
    let path = dir.path().join("new.gqlnb");

    let document = create_notebook(&path).unwrap();
    assert_eq!(document.cells, create_new());
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        r#"{"cells":[{"code":"","kind":"code"}]}"#
    );

    assert!(create_notebook(&path).is_err());
}
