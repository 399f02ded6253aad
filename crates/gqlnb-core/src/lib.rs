//! Core engine for GraphQL notebooks.
//!
//! This crate provides:
//! - Extraction of operations embedded in cells (GraphQL, JS/TS tagged
//!   templates, Rust `gql!` macros)
//! - Interactive variable resolution with type validation
//! - Endpoint discovery from GraphQL project config files
//! - Dispatch over HTTP, with Server-Sent Events for subscriptions
//! - Deterministic output formatting
//! - Per-cell execution with ordering, cancellation and per-endpoint controllers

pub mod config;
pub mod dispatch;
pub mod document;
pub mod endpoints;
pub mod error;
pub mod execute;
pub mod extract;
pub mod format;
pub mod variables;

pub use config::ExecutionConfig;
pub use dispatch::{DispatchItem, DispatchRequest, Dispatcher, HttpDispatcher, RawResult};
pub use document::{Cell, CellKind, GRAPHQL_LANGUAGE, MARKDOWN_LANGUAGE, NotebookDocument};
pub use endpoints::{
    EndpointDescriptor, EndpointIdentity, EndpointRegistry, GraphqlConfigRegistry, StaticRegistry,
    select_endpoint,
};
pub use error::{
    ConfigError, Error, ExtractionError, FormattingError, Result, TransportError, ValidationError,
};
pub use execute::{
    CancelToken, CellExecution, CellOutcome, CellSummary, Controller, ControllerRegistry,
    DocumentControllers, ExecutionCallback, ExecutionCoordinator, ExecutionEvent, ExecutionTask,
    OutputEvent, TaskId, TaskState, TaskSummary, TracingCallback,
};
pub use extract::{
    Extraction, ExtractedOperation, OperationKind, SourceSpan, TemplateExtractor, TypeRef,
    VariableDefinition,
};
pub use format::{ErrorKind, ErrorRecord, OutputFormatter, OutputRecord};
pub use variables::{
    PromptRequest, Prompter, ResolvedVariables, ScriptedPrompter, StaticPrompter, VariableResolver,
};
