//! Per-cell orchestration: extract, resolve, dispatch, format, emit.
//!
//! ```text
//! execute(cell) ──► driver task ──► mpsc<ExecutionEvent> ──► CellExecution (Stream)
//!                      │
//!                      ├── op 0: resolve vars ─► dispatch ─► format ─► Output*
//!                      ├── op 1: (starts once op 0 is terminal or Streaming)
//!                      └── streaming ops keep forwarding in a JoinSet
//! ```
//!
//! Operations in one cell run strictly in source order. A subscription
//! releases the next operation as soon as it is connected and keeps emitting
//! from its own forwarder until the server closes it or the cell is
//! cancelled. Cells are independent: each `execute` call gets its own driver
//! and cancel token.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

use crate::config::ExecutionConfig;
use crate::dispatch::{DispatchItem, DispatchRequest, Dispatcher, RawResult};
use crate::document::Cell;
use crate::endpoints::EndpointDescriptor;
use crate::error::{Error, Result};
use crate::extract::{ExtractedOperation, OperationKind, TemplateExtractor};
use crate::format::{ErrorRecord, OutputFormatter, OutputRecord};
use crate::variables::{Prompter, VariableResolver};

use super::context::{CancelToken, ExecutionCallback};
use super::task::{ExecutionTask, TaskId, TaskState};

/// One rendered output of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub task: TaskId,
    /// Per-task sequence number, starting at 0.
    pub sequence: u64,
    pub record: OutputRecord,
}

/// Events of one cell execution, in emission order.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Execution began; previous outputs of the cell should be cleared.
    Started { execution_id: Uuid, cell: usize },
    /// A task changed state.
    TaskState { task: ExecutionTask },
    /// A task produced output. Outputs are appended, never replaced.
    Output { task: ExecutionTask, output: OutputEvent },
    /// Execution ended.
    Finished(CellSummary),
}

/// Overall result of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

impl CellOutcome {
    /// `Succeeded` iff every task succeeded, else `Failed` if any failed,
    /// else `Cancelled`.
    pub fn from_states(states: impl IntoIterator<Item = TaskState>) -> Self {
        let mut outcome = CellOutcome::Succeeded;
        for state in states {
            match state {
                TaskState::Succeeded => {}
                TaskState::Failed => return CellOutcome::Failed,
                _ => outcome = CellOutcome::Cancelled,
            }
        }
        outcome
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CellOutcome::Succeeded)
    }
}

/// Final state of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub label: String,
    pub kind: Option<OperationKind>,
    pub state: TaskState,
    pub outputs: u64,
    pub duration_ms: Option<u64>,
}

impl From<&ExecutionTask> for TaskSummary {
    fn from(task: &ExecutionTask) -> Self {
        Self {
            id: task.id,
            label: task.label.clone(),
            kind: task.kind,
            state: task.state(),
            outputs: task.output_count(),
            duration_ms: task.duration().map(|d| d.as_millis() as u64),
        }
    }
}

/// Result of one cell execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSummary {
    pub execution_id: Uuid,
    pub cell: usize,
    pub outcome: CellOutcome,
    /// Tasks in operation order.
    pub tasks: Vec<TaskSummary>,
    pub duration_ms: u64,
}

/// Handle to a running cell execution.
///
/// Yields `ExecutionEvent`s as a `Stream`. Dropping the handle cancels the
/// execution.
pub struct CellExecution {
    events: mpsc::Receiver<ExecutionEvent>,
    cancel: CancelToken,
    driver: JoinHandle<CellSummary>,
}

impl CellExecution {
    /// Token that cancels this execution.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Stop further operations and close open streams.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Receive the next event; `None` once the execution has finished.
    pub async fn next_event(&mut self) -> Option<ExecutionEvent> {
        self.events.recv().await
    }

    /// Drain remaining events and return the summary.
    pub async fn wait(mut self) -> Result<CellSummary> {
        while self.events.recv().await.is_some() {}
        (&mut self.driver)
            .await
            .map_err(|e| Error::Aborted(e.to_string()))
    }
}

impl Drop for CellExecution {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Stream for CellExecution {
    type Item = ExecutionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

/// Runs cells against an endpoint.
#[derive(Clone)]
pub struct ExecutionCoordinator {
    dispatcher: Arc<dyn Dispatcher>,
    resolver: VariableResolver,
    extractor: TemplateExtractor,
    formatter: OutputFormatter,
    event_buffer: usize,
    callback: Option<Arc<dyn ExecutionCallback>>,
}

impl ExecutionCoordinator {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, prompter: Arc<dyn Prompter>, config: &ExecutionConfig) -> Self {
        Self {
            dispatcher,
            resolver: VariableResolver::new(prompter).with_max_attempts(config.max_prompt_attempts),
            extractor: TemplateExtractor::new(),
            formatter: OutputFormatter::new(),
            event_buffer: config.event_buffer.max(1),
            callback: None,
        }
    }

    /// Set the execution callback for progress reporting.
    pub fn with_callback(mut self, callback: Arc<dyn ExecutionCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Start executing `cell` against `endpoint`.
    ///
    /// Must be called within a Tokio runtime. Every call re-extracts and
    /// re-dispatches from scratch.
    pub fn execute(&self, cell_index: usize, cell: &Cell, endpoint: EndpointDescriptor) -> CellExecution {
        let (tx, rx) = mpsc::channel(self.event_buffer);
        let cancel = CancelToken::new();

        let driver = Driver {
            cell_index,
            cell: cell.clone(),
            endpoint,
            dispatcher: self.dispatcher.clone(),
            resolver: self.resolver.clone(),
            extractor: self.extractor,
            emitter: Emitter {
                events: tx,
                cancel: cancel.clone(),
                formatter: self.formatter,
                callback: self.callback.clone(),
            },
        };

        CellExecution {
            events: rx,
            cancel,
            driver: tokio::spawn(driver.run()),
        }
    }
}

/// Sends events for one execution.
#[derive(Clone)]
struct Emitter {
    events: mpsc::Sender<ExecutionEvent>,
    cancel: CancelToken,
    formatter: OutputFormatter,
    callback: Option<Arc<dyn ExecutionCallback>>,
}

impl Emitter {
    async fn send(&self, event: ExecutionEvent) {
        if self.events.send(event).await.is_err() {
            // Consumer is gone; nothing left to run for.
            self.cancel.cancel();
        }
    }

    async fn transition(&self, task: &mut ExecutionTask, next: TaskState) {
        if let Err(e) = task.transition(next) {
            tracing::warn!("{}", e);
            return;
        }
        if let Some(callback) = &self.callback {
            callback.on_task_state(task.id, next);
        }
        self.send(ExecutionEvent::TaskState { task: task.clone() }).await;
    }

    async fn output(&self, task: &mut ExecutionTask, record: OutputRecord) {
        let output = OutputEvent {
            task: task.id,
            sequence: task.next_sequence(),
            record,
        };
        self.send(ExecutionEvent::Output {
            task: task.clone(),
            output,
        })
        .await;
    }

    /// Format and emit a result. Returns whether the record is an error.
    async fn result(&self, task: &mut ExecutionTask, raw: &RawResult) -> bool {
        let record = self.formatter.format(raw);
        let is_error = record.is_error();
        self.output(task, record).await;
        is_error
    }

    async fn error(&self, task: &mut ExecutionTask, error: &Error) {
        self.output(task, OutputRecord::Error(ErrorRecord::from_error(error)))
            .await;
    }
}

/// What running an operation up to its release point produced.
enum Step {
    Done(ExecutionTask),
    Streaming(ActiveStream),
}

/// A subscription that has been released and is still delivering.
struct ActiveStream {
    task: ExecutionTask,
    stream: BoxStream<'static, DispatchItem>,
    saw_error: bool,
}

struct Driver {
    cell_index: usize,
    cell: Cell,
    endpoint: EndpointDescriptor,
    dispatcher: Arc<dyn Dispatcher>,
    resolver: VariableResolver,
    extractor: TemplateExtractor,
    emitter: Emitter,
}

impl Driver {
    async fn run(self) -> CellSummary {
        let started = Instant::now();
        let execution_id = Uuid::new_v4();
        let cancel = self.emitter.cancel.clone();

        self.emitter
            .send(ExecutionEvent::Started {
                execution_id,
                cell: self.cell_index,
            })
            .await;

        let extraction = self.extractor.extract(&self.cell.source, &self.cell.language);
        let mut finished: Vec<ExecutionTask> = Vec::new();
        let mut forwarders: JoinSet<ExecutionTask> = JoinSet::new();

        for (ordinal, item) in extraction.iter().enumerate() {
            let id = TaskId::new(self.cell_index, ordinal);

            let mut task = match &item {
                Ok(op) => ExecutionTask::new(id, op.label(), Some(op.kind)),
                Err(_) => ExecutionTask::new(id, "invalid operation", None),
            };
            self.emitter
                .send(ExecutionEvent::TaskState { task: task.clone() })
                .await;

            if cancel.is_cancelled() {
                self.emitter.transition(&mut task, TaskState::Cancelled).await;
                finished.push(task);
                continue;
            }

            match item {
                Err(e) => {
                    tracing::debug!(task = %id, "extraction failed: {}", e);
                    self.emitter.error(&mut task, &Error::Extraction(e)).await;
                    self.emitter.transition(&mut task, TaskState::Failed).await;
                    finished.push(task);
                }
                Ok(op) => match self.run_operation(task, &op).await {
                    Step::Done(task) => finished.push(task),
                    Step::Streaming(active) => {
                        forwarders.spawn(forward(active, self.emitter.clone()));
                    }
                },
            }
        }

        while let Some(joined) = forwarders.join_next().await {
            match joined {
                Ok(task) => finished.push(task),
                Err(e) => tracing::warn!("subscription forwarder stopped: {}", e),
            }
        }

        finished.sort_by_key(|t| t.id.ordinal);
        let outcome = CellOutcome::from_states(finished.iter().map(|t| t.state()));
        let summary = CellSummary {
            execution_id,
            cell: self.cell_index,
            outcome,
            tasks: finished.iter().map(TaskSummary::from).collect(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        if let Some(callback) = &self.emitter.callback {
            callback.on_cell_finished(self.cell_index, outcome.is_success());
        }
        tracing::info!(
            cell = self.cell_index,
            ?outcome,
            tasks = summary.tasks.len(),
            duration_ms = summary.duration_ms,
            "cell execution finished"
        );

        self.emitter.send(ExecutionEvent::Finished(summary.clone())).await;
        summary
    }

    /// Run one operation until it is terminal or streaming.
    async fn run_operation(&self, mut task: ExecutionTask, op: &ExtractedOperation) -> Step {
        let emitter = &self.emitter;
        let cancel = &emitter.cancel;
        let label = task.label.clone();

        let variables = match self
            .resolver
            .resolve(&label, &op.variable_definitions(), cancel)
            .await
        {
            Ok(variables) => variables,
            Err(Error::Cancelled) => {
                emitter.transition(&mut task, TaskState::Cancelled).await;
                return Step::Done(task);
            }
            Err(e) => {
                emitter.error(&mut task, &e).await;
                emitter.transition(&mut task, TaskState::Failed).await;
                return Step::Done(task);
            }
        };

        emitter.transition(&mut task, TaskState::Running).await;

        let request = DispatchRequest::new(self.endpoint.clone(), op, variables);
        let mut stream = self.dispatcher.dispatch(request, cancel.clone());

        loop {
            match stream.next().await {
                Some(DispatchItem::Connected) if op.kind.is_streaming() => {
                    emitter.transition(&mut task, TaskState::Streaming).await;
                    return Step::Streaming(ActiveStream {
                        task,
                        stream,
                        saw_error: false,
                    });
                }
                Some(DispatchItem::Connected) => {}
                Some(DispatchItem::Result(raw)) if op.kind.is_streaming() && !raw.is_transport_error() => {
                    if cancel.is_cancelled() {
                        emitter.transition(&mut task, TaskState::Cancelled).await;
                        return Step::Done(task);
                    }
                    emitter.transition(&mut task, TaskState::Streaming).await;
                    let saw_error = emitter.result(&mut task, &raw).await;
                    return Step::Streaming(ActiveStream {
                        task,
                        saw_error,
                        stream,
                    });
                }
                Some(DispatchItem::Result(raw)) | Some(DispatchItem::Response(raw)) => {
                    if cancel.is_cancelled() {
                        emitter.transition(&mut task, TaskState::Cancelled).await;
                        return Step::Done(task);
                    }
                    let failed = emitter.result(&mut task, &raw).await;
                    let next = if failed {
                        TaskState::Failed
                    } else {
                        TaskState::Succeeded
                    };
                    emitter.transition(&mut task, next).await;
                    return Step::Done(task);
                }
                None => {
                    let next = if cancel.is_cancelled() {
                        TaskState::Cancelled
                    } else if op.kind.is_streaming() {
                        TaskState::Succeeded
                    } else {
                        let e = Error::Transport(crate::error::TransportError::Stream(
                            "no response received".to_string(),
                        ));
                        emitter.error(&mut task, &e).await;
                        TaskState::Failed
                    };
                    emitter.transition(&mut task, next).await;
                    return Step::Done(task);
                }
            }
        }
    }
}

/// Forward a released subscription's remaining results until it ends.
async fn forward(mut active: ActiveStream, emitter: Emitter) -> ExecutionTask {
    let cancel = emitter.cancel.clone();
    let mut broken = false;

    while let Some(item) = active.stream.next().await {
        if cancel.is_cancelled() {
            break;
        }
        let (DispatchItem::Result(raw) | DispatchItem::Response(raw)) = item else {
            continue;
        };
        active.saw_error |= emitter.result(&mut active.task, &raw).await;
        if raw.is_transport_error() {
            broken = true;
            break;
        }
    }

    let next = if broken || active.saw_error {
        TaskState::Failed
    } else if cancel.is_cancelled() {
        TaskState::Cancelled
    } else {
        TaskState::Succeeded
    };
    emitter.transition(&mut active.task, next).await;
    active.task
}
