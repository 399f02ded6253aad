//! Template extraction: finding and parsing the operations embedded in a cell.
//!
//! ```text
//! cell text ──► locate literals (per host language) ──► parse each literal ──► ExtractedOperation*
//! ```
//!
//! Each literal is parsed independently. A literal that fails to parse yields
//! one `ExtractionError` at its position in the sequence and does not stop the
//! remaining literals from being parsed.

mod host;
mod types;

use std::sync::Arc;

use async_graphql_parser::Pos;
use async_graphql_parser::types::DocumentOperations;

use crate::error::ExtractionError;

use host::{HostLanguage, Literal, line_starts, locate_literals, offset_of};

pub use types::{ExtractedOperation, OperationKind, SourceSpan, TypeRef, VariableDefinition};

/// One item of an extraction: an operation or the error for a literal.
pub type ExtractionItem = std::result::Result<ExtractedOperation, ExtractionError>;

/// Extracts operations from cell source text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateExtractor;

impl TemplateExtractor {
    /// Create a new extractor.
    pub fn new() -> Self {
        Self
    }

    /// Locate the literals in `text` for the given language tag.
    ///
    /// Parsing happens when the returned extraction is iterated, and again on
    /// every iteration.
    pub fn extract(&self, text: &str, language: &str) -> Extraction {
        let literals = locate_literals(text, HostLanguage::from_tag(language));
        tracing::debug!(language, literals = literals.len(), "located operation literals");
        Extraction { literals }
    }
}

/// The literals of one cell, parsed lazily on iteration.
#[derive(Debug, Clone)]
pub struct Extraction {
    literals: Vec<Literal>,
}

impl Extraction {
    /// Number of literals found (not operations: one literal may hold several).
    pub fn literal_count(&self) -> usize {
        self.literals.len()
    }

    /// Whether the cell contains no literals at all.
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Iterate the cell's operations in source order.
    pub fn iter(&self) -> impl Iterator<Item = ExtractionItem> + '_ {
        self.literals
            .iter()
            .flat_map(parse_literal)
            .enumerate()
            .map(|(ordinal, item)| {
                item.map(|mut op| {
                    op.ordinal = ordinal;
                    op
                })
            })
    }
}

impl<'a> IntoIterator for &'a Extraction {
    type Item = ExtractionItem;
    type IntoIter = Box<dyn Iterator<Item = ExtractionItem> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Parse one literal into its operations.
fn parse_literal(literal: &Literal) -> Vec<ExtractionItem> {
    if let Some(message) = &literal.error {
        return vec![Err(ExtractionError {
            span: literal.span,
            message: message.clone(),
        })];
    }

    let document = match async_graphql_parser::parse_query(&literal.text) {
        Ok(document) => Arc::new(document),
        Err(e) => {
            tracing::debug!(span = %literal.span, "literal failed to parse: {}", e);
            return vec![Err(ExtractionError {
                span: literal.span,
                message: e.to_string(),
            })];
        }
    };

    let text = literal.text.as_str();
    let starts = line_starts(text);
    let offset = |pos: Pos| offset_of(text, &starts, pos.line, pos.column.saturating_sub(1));

    let mut operations: Vec<(usize, Option<String>, OperationKind)> = match &document.operations {
        DocumentOperations::Single(op) => vec![(offset(op.pos), None, op.node.ty.into())],
        DocumentOperations::Multiple(ops) => ops
            .iter()
            .map(|(name, op)| (offset(op.pos), Some(name.to_string()), op.node.ty.into()))
            .collect(),
    };
    operations.sort_by_key(|(start, ..)| *start);

    // Every definition start bounds the operation before it.
    let mut boundaries: Vec<usize> = operations
        .iter()
        .map(|(start, ..)| *start)
        .chain(document.fragments.values().map(|f| offset(f.pos)))
        .collect();
    boundaries.sort_unstable();

    let document_text: Arc<str> = Arc::from(text);
    let aligned = literal.text.len() == literal.span.len();

    operations
        .into_iter()
        .map(|(start, name, kind)| {
            let next = boundaries
                .iter()
                .copied()
                .find(|b| *b > start)
                .unwrap_or(text.len());
            let end = start + text[start..next].trim_end().len();
            let span = if aligned {
                SourceSpan::new(literal.span.start + start, literal.span.start + end)
            } else {
                literal.span
            };
            Ok(ExtractedOperation {
                ordinal: 0,
                span,
                kind,
                name,
                document_text: document_text.clone(),
                document: document.clone(),
            })
        })
        .collect()
}
