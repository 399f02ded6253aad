//! Execution engine for GraphQL notebooks.
//!
//! # Architecture
//!
//! ```text
//! ControllerRegistry ── one Controller per (config dir, project, endpoint)
//!     │
//!     └── Controller::execute_cell
//!             │
//!             └── ExecutionCoordinator ──► CellExecution (event stream + cancel)
//!                     │
//!                     ├── TemplateExtractor
//!                     ├── VariableResolver ── Prompter
//!                     ├── Dispatcher (HTTP / SSE)
//!                     └── OutputFormatter
//! ```
//!
//! # Module Structure
//!
//! - `context` - Cancel token and execution callbacks
//! - `task` - Per-operation lifecycle state machine
//! - `coordinator` - Per-cell orchestration and event stream
//! - `controller` - Per-endpoint controllers and their registry

mod context;
mod controller;
mod coordinator;
mod task;

pub use context::{CancelToken, ExecutionCallback, TracingCallback};
pub use controller::{Controller, ControllerRegistry, DocumentControllers};
pub use coordinator::{
    CellExecution, CellOutcome, CellSummary, ExecutionCoordinator, ExecutionEvent, OutputEvent,
    TaskSummary,
};
pub use task::{ExecutionTask, TaskId, TaskState};
