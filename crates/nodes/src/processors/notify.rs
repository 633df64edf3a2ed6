//! Notify node: send a message through a channel configured in settings.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use super::fail;
use crate::collaborators::{NotifyChannelSender, SettingsRepository};
use crate::dispatcher::Collaborators;
use crate::log::NodeLogger;
use crate::models::{NotifyNodeConfig, WorkflowNode, SETTINGS_NOTIFY_CHANNELS};
use crate::traits::{NodeOutcome, NodeProcessor};
use crate::{NodeError, RunContext};

pub struct NotifyNode {
    node: WorkflowNode,
    logger: NodeLogger,
    settings: Arc<dyn SettingsRepository>,
    sender: Arc<dyn NotifyChannelSender>,
}

impl NotifyNode {
    pub fn new(node: WorkflowNode, collab: &Collaborators) -> Self {
        let logger = NodeLogger::new(&node);
        Self {
            node,
            logger,
            settings: collab.settings.clone(),
            sender: collab.notifier.clone(),
        }
    }
}

#[async_trait]
impl NodeProcessor for NotifyNode {
    #[instrument(skip_all, fields(node_id = %self.node.id, run_id = %ctx.run_id))]
    async fn process(&self, ctx: &RunContext) -> Result<NodeOutcome, NodeError> {
        self.logger.info("entering notify node");

        let config: NotifyNodeConfig = self
            .node
            .config_as()
            .map_err(|e| fail(&self.logger, "invalid notify node config", e))?;
        if config.channel.trim().is_empty() {
            return Err(fail(
                &self.logger,
                "invalid notify node config",
                NodeError::InvalidConfig("`channel` is required".into()),
            ));
        }

        let settings = self
            .settings
            .get_by_name(SETTINGS_NOTIFY_CHANNELS)
            .await
            .map_err(|e| {
                fail(
                    &self.logger,
                    "failed to resolve notify settings",
                    NodeError::repository("get notify settings", e),
                )
            })?;

        let channel_config = settings
            .notify_channel_config(&config.channel)
            .map_err(|message| {
                fail(
                    &self.logger,
                    "failed to resolve notify channel",
                    NodeError::ChannelResolution {
                        channel: config.channel.clone(),
                        message,
                    },
                )
            })?;

        self.sender
            .send(&config.subject, &config.message, &config.channel, &channel_config)
            .await
            .map_err(|e| {
                fail(
                    &self.logger,
                    "failed to send notification",
                    NodeError::external(format!("notify.{}", config.channel), e),
                )
            })?;

        self.logger
            .info(format!("notification sent via {}", config.channel));
        Ok(NodeOutcome::Completed)
    }

    fn logger(&self) -> &NodeLogger {
        &self.logger
    }
}
