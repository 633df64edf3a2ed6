use async_trait::async_trait;
use tracing::instrument;

use crate::log::NodeLogger;
use crate::models::WorkflowNode;
use crate::traits::{NodeOutcome, NodeProcessor};
use crate::{NodeError, RunContext};

/// Entry vertex of every workflow; does nothing but mark the run start.
pub struct StartNode {
    node: WorkflowNode,
    logger: NodeLogger,
}

impl StartNode {
    pub fn new(node: WorkflowNode) -> Self {
        let logger = NodeLogger::new(&node);
        Self { node, logger }
    }
}

#[async_trait]
impl NodeProcessor for StartNode {
    #[instrument(skip_all, fields(node_id = %self.node.id, run_id = %ctx.run_id))]
    async fn process(&self, ctx: &RunContext) -> Result<NodeOutcome, NodeError> {
        self.logger.info("entering start node");
        Ok(NodeOutcome::Completed)
    }

    fn logger(&self) -> &NodeLogger {
        &self.logger
    }
}
