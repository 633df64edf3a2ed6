//! Workflow runner.
//!
//! `WorkflowRunner` is the reference orchestrator:
//! 1. Validates the graph.
//! 2. Walks it node by node from the start node, obtaining a fresh
//!    processor per node from the [`NodeDispatcher`].
//! 3. Collects every node log into the run record, persisting the run after
//!    each node.
//! 4. Picks the next node from the outcome: a condition follows
//!    `on_true`/`on_false`, a success follows `on_success` (else `next`), a
//!    failure follows `on_failure` (else the run stops), cancellation stops.
//!    A node whose processor cannot be created counts as a failed node.
//!
//! Node N+1 never starts before node N returns.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use nodes::{NodeDispatcher, NodeError, NodeLogger, NodeOutcome, RunContext};

use crate::dag::validate_graph;
use crate::models::{EdgeKind, RunStatus, Workflow, WorkflowNode, WorkflowRun};
use crate::store::WorkflowRunRepository;
use crate::EngineError;

/// Stateless orchestrator; one instance serves any number of runs.
pub struct WorkflowRunner {
    dispatcher: NodeDispatcher,
    runs: Arc<dyn WorkflowRunRepository>,
}

impl WorkflowRunner {
    pub fn new(dispatcher: NodeDispatcher, runs: Arc<dyn WorkflowRunRepository>) -> Self {
        Self { dispatcher, runs }
    }

    /// Run the workflow to completion and return the finished run record.
    ///
    /// Node failures do not make this return `Err`; they are recorded in the
    /// run, whose status becomes `Failed` (even when a failure branch ran).
    ///
    /// # Errors
    /// Returns `EngineError` for graph validation failures or when the run
    /// store rejects a write.
    #[instrument(skip(self, workflow, ctx), fields(workflow_id = %workflow.id, run_id = %ctx.run_id))]
    pub async fn run(
        &self,
        workflow: &Workflow,
        ctx: &RunContext,
    ) -> Result<WorkflowRun, EngineError> {
        let graph = validate_graph(workflow)?;
        info!("graph validated, {} nodes", graph.order().len());

        let mut run = WorkflowRun::start(ctx.run_id, workflow.id);
        self.runs
            .create(&run)
            .await
            .map_err(|source| EngineError::RunStore {
                operation: "create run",
                source,
            })?;

        let mut failed = false;
        let mut cancelled = false;
        let mut current = Some(graph.start());

        while let Some(node) = current {
            if ctx.is_cancelled() {
                cancelled = true;
                break;
            }

            let processor = match self.dispatcher.get_processor(node) {
                Ok(p) => p,
                Err(e) => {
                    error!(node_id = %node.id, "{e}");
                    let logger = NodeLogger::new(node);
                    logger.error("failed to create node processor", &e);
                    run.logs.push(logger.snapshot());
                    run.error.get_or_insert_with(|| format!("node '{}': {e}", node.id));
                    failed = true;
                    current = graph.successor(&node.id, EdgeKind::OnFailure);
                    self.persist(&run, "update run").await?;
                    continue;
                }
            };

            let outcome = processor.process(ctx).await;
            run.logs.push(processor.get_log());

            current = match outcome {
                Ok(NodeOutcome::Branch(result)) => {
                    let kind = if result { EdgeKind::OnTrue } else { EdgeKind::OnFalse };
                    info!(node_id = %node.id, "condition took the {kind} branch");
                    graph.successor(&node.id, kind)
                }
                Ok(NodeOutcome::Completed) => {
                    info!(node_id = %node.id, "node succeeded");
                    graph
                        .successor(&node.id, EdgeKind::OnSuccess)
                        .or_else(|| graph.successor(&node.id, EdgeKind::Next))
                }
                Err(NodeError::Cancelled) => {
                    warn!(node_id = %node.id, "node stopped by cancellation");
                    cancelled = true;
                    None
                }
                Err(e) => {
                    error!(node_id = %node.id, "node failed: {e}");
                    run.error.get_or_insert_with(|| failure_message(node, &e));
                    failed = true;
                    graph.successor(&node.id, EdgeKind::OnFailure)
                }
            };

            self.persist(&run, "update run").await?;
        }

        let status = if cancelled {
            run.error
                .get_or_insert_with(|| NodeError::Cancelled.to_string());
            RunStatus::Cancelled
        } else if failed {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };
        run.finish(status);

        self.persist(&run, "finish run").await?;

        info!("run finished: {status}");
        Ok(run)
    }
}

impl WorkflowRunner {
    async fn persist(&self, run: &WorkflowRun, operation: &'static str) -> Result<(), EngineError> {
        self.runs
            .update(run)
            .await
            .map_err(|source| EngineError::RunStore { operation, source })
    }
}

fn failure_message(node: &WorkflowNode, err: &NodeError) -> String {
    format!("node '{}' failed: {err}", node.id)
}
