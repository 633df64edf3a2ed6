//! Success / failure branch anchors.
//!
//! The orchestrator enters these after a prior node's success or failure.
//! They only mark the branch in the log and always succeed themselves.

use async_trait::async_trait;
use tracing::instrument;

use crate::log::NodeLogger;
use crate::models::WorkflowNode;
use crate::traits::{NodeOutcome, NodeProcessor};
use crate::{NodeError, RunContext};

pub struct ExecuteSuccessNode {
    node: WorkflowNode,
    logger: NodeLogger,
}

impl ExecuteSuccessNode {
    pub fn new(node: WorkflowNode) -> Self {
        let logger = NodeLogger::new(&node);
        Self { node, logger }
    }
}

#[async_trait]
impl NodeProcessor for ExecuteSuccessNode {
    #[instrument(skip_all, fields(node_id = %self.node.id, run_id = %ctx.run_id))]
    async fn process(&self, ctx: &RunContext) -> Result<NodeOutcome, NodeError> {
        self.logger.info("entering success branch");
        Ok(NodeOutcome::Completed)
    }

    fn logger(&self) -> &NodeLogger {
        &self.logger
    }
}

pub struct ExecuteFailureNode {
    node: WorkflowNode,
    logger: NodeLogger,
}

impl ExecuteFailureNode {
    pub fn new(node: WorkflowNode) -> Self {
        let logger = NodeLogger::new(&node);
        Self { node, logger }
    }
}

#[async_trait]
impl NodeProcessor for ExecuteFailureNode {
    #[instrument(skip_all, fields(node_id = %self.node.id, run_id = %ctx.run_id))]
    async fn process(&self, ctx: &RunContext) -> Result<NodeOutcome, NodeError> {
        self.logger.info("entering failure branch");
        Ok(NodeOutcome::Completed)
    }

    fn logger(&self) -> &NodeLogger {
        &self.logger
    }
}
