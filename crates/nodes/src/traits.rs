//! The `NodeProcessor` trait — the contract every node kind must fulfil.

use async_trait::async_trait;

use crate::log::{LogLevel, NodeLogger, WorkflowRunLog};
use crate::{NodeError, RunContext};

/// What a successful `process` call tells the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Continue along the node's single successor.
    Completed,
    /// A condition node's result; selects the true or false branch.
    Branch(bool),
}

/// The executable behaviour bound to one node for one run.
///
/// `process` performs the node's work and is called once per run. Before it
/// returns an error, the error is already in the node's log, so the log is a
/// faithful record even if the caller drops the error.
#[async_trait]
pub trait NodeProcessor: Send + Sync {
    async fn process(&self, ctx: &RunContext) -> Result<NodeOutcome, NodeError>;

    /// Handle to this node's log.
    fn logger(&self) -> &NodeLogger;

    /// Snapshot of the accumulated log. Callable at any time, including
    /// while `process` is still running.
    fn get_log(&self) -> WorkflowRunLog {
        self.logger().snapshot()
    }

    /// Record one timestamped entry. An `error` also sets the log's terminal
    /// error field.
    fn append_log_record(&self, level: LogLevel, content: &str, error: Option<&str>) {
        self.logger().append(level, content, error);
    }
}
