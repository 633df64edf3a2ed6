//! Per-run context threaded through every processor call.

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::NodeError;

/// Identity and cancellation signal of one workflow run.
///
/// Populated by the orchestrator before any processor is invoked. Cloning is
/// cheap; clones share the same cancellation token.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// ID of the parent workflow.
    pub workflow_id: Uuid,
    /// ID of the current run.
    pub run_id: Uuid,
    /// Variables supplied when the run was triggered. Condition nodes
    /// evaluate against this value.
    pub input: Value,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new(workflow_id: Uuid, run_id: Uuid) -> Self {
        Self {
            workflow_id,
            run_id,
            input: Value::Null,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    /// Replace the cancellation token, e.g. with a child of a server-wide one.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the run is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Return `NodeError::Cancelled` if the run has been stopped.
    pub fn ensure_active(&self) -> Result<(), NodeError> {
        if self.is_cancelled() {
            return Err(NodeError::Cancelled);
        }
        Ok(())
    }
}
