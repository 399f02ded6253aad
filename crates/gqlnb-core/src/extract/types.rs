//! Types produced by template extraction.

use std::fmt;
use std::sync::Arc;

use async_graphql_parser::types::{
    BaseType, DocumentOperations, ExecutableDocument, OperationDefinition, OperationType, Type,
};
use serde::{Deserialize, Serialize};

/// Byte range within a cell's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// The three GraphQL operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// Subscriptions yield an open-ended stream; everything else is single-shot.
    pub fn is_streaming(&self) -> bool {
        matches!(self, OperationKind::Subscription)
    }
}

impl From<OperationType> for OperationKind {
    fn from(ty: OperationType) -> Self {
        match ty {
            OperationType::Query => OperationKind::Query,
            OperationType::Mutation => OperationKind::Mutation,
            OperationType::Subscription => OperationKind::Subscription,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        };
        f.write_str(s)
    }
}

/// Declared type of a variable: a named type, a list, or a non-null wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    /// Convert from the parser's representation.
    pub fn from_ast(ty: &Type) -> Self {
        let inner = match &ty.base {
            BaseType::Named(name) => TypeRef::Named(name.to_string()),
            BaseType::List(item) => TypeRef::List(Box::new(TypeRef::from_ast(item))),
        };
        if ty.nullable {
            inner
        } else {
            TypeRef::NonNull(Box::new(inner))
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }

    /// The type with any non-null wrapper removed.
    pub fn nullable(&self) -> &TypeRef {
        match self {
            TypeRef::NonNull(inner) => inner,
            other => other,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

/// A variable declared by an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    /// Name without the leading `$`.
    pub name: String,
    /// Declared type.
    pub type_ref: TypeRef,
    /// Declared default value, if any.
    pub default_value: Option<serde_json::Value>,
}

impl VariableDefinition {
    pub fn has_default(&self) -> bool {
        self.default_value.is_some()
    }
}

/// One operation found inside a cell.
///
/// Produced fresh by every extraction; never cached, since the cell text may
/// have changed between runs.
#[derive(Debug, Clone)]
pub struct ExtractedOperation {
    /// Position of this operation among all operations of the cell.
    pub ordinal: usize,
    /// Span of the operation within the cell.
    pub span: SourceSpan,
    /// Operation kind.
    pub kind: OperationKind,
    /// Operation name, if the operation is named.
    pub name: Option<String>,
    /// Full text of the literal the operation came from. Sent as the request
    /// document so that fragments defined alongside the operation resolve.
    pub document_text: Arc<str>,
    /// Parsed literal.
    pub document: Arc<ExecutableDocument>,
}

impl ExtractedOperation {
    /// The operation's definition node within the parsed literal.
    pub fn definition(&self) -> Option<&OperationDefinition> {
        match &self.document.operations {
            DocumentOperations::Single(op) => Some(&op.node),
            DocumentOperations::Multiple(ops) => ops
                .iter()
                .find(|(name, _)| Some(name.to_string()) == self.name)
                .map(|(_, op)| &op.node),
        }
    }

    /// Variable definitions, in the order they are declared.
    ///
    /// Walks the AST on every call.
    pub fn variable_definitions(&self) -> Vec<VariableDefinition> {
        let Some(op) = self.definition() else {
            return Vec::new();
        };
        op.variable_definitions
            .iter()
            .map(|def| VariableDefinition {
                name: def.node.name.node.to_string(),
                type_ref: TypeRef::from_ast(&def.node.var_type.node),
                default_value: def
                    .node
                    .default_value
                    .as_ref()
                    .and_then(|v| v.node.clone().into_json().ok()),
            })
            .collect()
    }

    /// Label used in logs and output headers.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} {}", self.kind, name),
            None => format!("anonymous {}", self.kind),
        }
    }
}
