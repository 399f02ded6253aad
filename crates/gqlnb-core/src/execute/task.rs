//! Lifecycle record for one (cell, operation) pair.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::extract::OperationKind;

/// Identifier of a task within one cell execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId {
    pub cell: usize,
    pub ordinal: usize,
}

impl TaskId {
    pub fn new(cell: usize, ordinal: usize) -> Self {
        Self { cell, ordinal }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell_{}#{}", self.cell, self.ordinal)
    }
}

/// Task lifecycle state.
///
/// ```text
/// Pending ──► Running ──► Succeeded | Failed | Streaming
///    │                                      │
///    └──► Failed | Cancelled                └──► Succeeded | Failed | Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Not started yet
    Pending,
    /// Variables resolved, request in flight
    Running,
    /// Subscription delivering results
    Streaming,
    /// Finished successfully
    Succeeded,
    /// Finished with an error
    Failed,
    /// Stopped by cancellation
    Cancelled,
}

impl TaskState {
    /// Terminal states never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, Running | Failed | Cancelled)
                | (Running, Succeeded | Failed | Streaming | Cancelled)
                | (Streaming, Succeeded | Failed | Cancelled)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Streaming => "streaming",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One operation's execution record.
#[derive(Debug, Clone)]
pub struct ExecutionTask {
    pub id: TaskId,
    /// Human-readable operation label.
    pub label: String,
    /// `None` when the operation failed to extract.
    pub kind: Option<OperationKind>,
    state: TaskState,
    started: Option<Instant>,
    finished: Option<Instant>,
    next_sequence: u64,
}

impl ExecutionTask {
    pub fn new(id: TaskId, label: impl Into<String>, kind: Option<OperationKind>) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
            state: TaskState::Pending,
            started: None,
            finished: None,
            next_sequence: 0,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Move to `next`, recording timing.
    ///
    /// Fails without changing anything if the transition would go backwards or
    /// leave a terminal state.
    pub fn transition(&mut self, next: TaskState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition(format!(
                "{}: {} -> {}",
                self.id, self.state, next
            )));
        }

        let now = Instant::now();
        if next == TaskState::Running {
            self.started = Some(now);
        }
        if next.is_terminal() {
            self.finished = Some(now);
        }

        tracing::debug!(task = %self.id, from = %self.state, to = %next, "task transition");
        self.state = next;
        Ok(())
    }

    /// Allocate the next output sequence number for this task.
    pub fn next_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    /// Number of outputs emitted so far.
    pub fn output_count(&self) -> u64 {
        self.next_sequence
    }

    /// Time spent between `Running` and the terminal state.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started, self.finished) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }
}
