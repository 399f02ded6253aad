//! Cancellation and progress reporting for cell executions.

use std::sync::Arc;

use tokio::sync::watch;

use crate::execute::task::{TaskId, TaskState};

/// Handle for cancelling one cell execution.
///
/// `CancelToken` is cheap to clone; every clone observes the same flag. It is
/// threaded through the variable prompt wait and the in-flight dispatch, and
/// both abort as soon as it fires.
///
/// # Example
///
/// ```
/// use gqlnb_core::execute::CancelToken;
///
/// let token = CancelToken::new();
/// let clone = token.clone();
///
/// assert!(!token.is_cancelled());
/// clone.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone, Debug)]
pub struct CancelToken {
    state: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a new, untriggered token.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { state: Arc::new(tx) }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    /// Resolve once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so `wait_for` only returns once the flag is set.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Callback trait for execution progress reporting.
///
/// Complements the event stream for hosts that want push-style
/// notifications (status bars, logs).
pub trait ExecutionCallback: Send + Sync {
    /// Called on every task state transition.
    fn on_task_state(&self, task: TaskId, state: TaskState);

    /// Called when a cell execution finishes.
    fn on_cell_finished(&self, _cell_index: usize, _success: bool) {}
}

/// Callback that forwards transitions to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCallback;

impl ExecutionCallback for TracingCallback {
    fn on_task_state(&self, task: TaskId, state: TaskState) {
        tracing::debug!(%task, ?state, "task state changed");
    }

    fn on_cell_finished(&self, cell_index: usize, success: bool) {
        tracing::info!(cell_index, success, "cell finished");
    }
}
