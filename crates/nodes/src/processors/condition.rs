use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use super::fail;
use crate::collaborators::ConditionEvaluator;
use crate::log::NodeLogger;
use crate::models::{ConditionNodeConfig, WorkflowNode};
use crate::traits::{NodeOutcome, NodeProcessor};
use crate::{NodeError, RunContext};

/// Evaluates a predicate over the run input and reports which branch to take.
pub struct ConditionNode {
    node: WorkflowNode,
    logger: NodeLogger,
    evaluator: Arc<dyn ConditionEvaluator>,
}

impl ConditionNode {
    pub fn new(node: WorkflowNode, evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        let logger = NodeLogger::new(&node);
        Self {
            node,
            logger,
            evaluator,
        }
    }
}

#[async_trait]
impl NodeProcessor for ConditionNode {
    #[instrument(skip_all, fields(node_id = %self.node.id, run_id = %ctx.run_id))]
    async fn process(&self, ctx: &RunContext) -> Result<NodeOutcome, NodeError> {
        self.logger.info("entering condition node");

        let config: ConditionNodeConfig = self
            .node
            .config_as()
            .map_err(|e| fail(&self.logger, "invalid condition node config", e))?;

        let result = self
            .evaluator
            .evaluate(&config.expression, &ctx.input)
            .map_err(|msg| {
                fail(
                    &self.logger,
                    "failed to evaluate condition",
                    NodeError::InvalidConfig(format!("invalid condition expression: {msg}")),
                )
            })?;

        self.logger.info(format!("condition evaluated to {result}"));
        Ok(NodeOutcome::Branch(result))
    }

    fn logger(&self) -> &NodeLogger {
        &self.logger
    }
}
