//! Upload node: store a user-supplied certificate so downstream deploy
//! nodes can use it like an issued one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use super::{fail, optional};
use crate::certs;
use crate::collaborators::{CertificateRepository, WorkflowOutputRepository};
use crate::dispatcher::Collaborators;
use crate::log::NodeLogger;
use crate::models::{Certificate, CertificateSource, UploadNodeConfig, WorkflowNode, WorkflowOutput};
use crate::traits::{NodeOutcome, NodeProcessor};
use crate::{NodeError, RunContext};

pub struct UploadNode {
    node: WorkflowNode,
    logger: NodeLogger,
    certificates: Arc<dyn CertificateRepository>,
    outputs: Arc<dyn WorkflowOutputRepository>,
}

impl UploadNode {
    pub fn new(node: WorkflowNode, collab: &Collaborators) -> Self {
        let logger = NodeLogger::new(&node);
        Self {
            node,
            logger,
            certificates: collab.certificates.clone(),
            outputs: collab.outputs.clone(),
        }
    }

    async fn already_stored(&self, config: &UploadNodeConfig) -> Result<bool, NodeError> {
        let last = optional(self.outputs.get_by_node_id(&self.node.id).await).map_err(|e| {
            fail(
                &self.logger,
                "failed to load previous output",
                NodeError::repository("get workflow output", e),
            )
        })?;
        if !last.is_some_and(|o| o.succeeded && o.node_config == self.node.config) {
            return Ok(false);
        }

        let current = optional(self.certificates.get_by_workflow_node_id(&self.node.id).await)
            .map_err(|e| {
                fail(
                    &self.logger,
                    "failed to load current certificate",
                    NodeError::repository("get certificate", e),
                )
            })?;
        Ok(current.is_some_and(|c| {
            c.certificate == config.certificate && c.private_key == config.private_key
        }))
    }
}

#[async_trait]
impl NodeProcessor for UploadNode {
    #[instrument(skip_all, fields(node_id = %self.node.id, run_id = %ctx.run_id))]
    async fn process(&self, ctx: &RunContext) -> Result<NodeOutcome, NodeError> {
        self.logger.info("entering upload node");

        let config: UploadNodeConfig = self
            .node
            .config_as()
            .map_err(|e| fail(&self.logger, "invalid upload node config", e))?;
        if config.certificate.trim().is_empty() || config.private_key.trim().is_empty() {
            return Err(fail(
                &self.logger,
                "invalid upload node config",
                NodeError::InvalidConfig("`certificate` and `privateKey` are required".into()),
            ));
        }

        let info = certs::inspect_pem(&config.certificate)
            .map_err(|e| fail(&self.logger, "failed to parse uploaded certificate", e))?;
        certs::ensure_private_key_pem(&config.private_key)
            .map_err(|e| fail(&self.logger, "failed to parse uploaded private key", e))?;

        if self.already_stored(&config).await? {
            self.logger.info("certificate already uploaded, skipping");
            return Ok(NodeOutcome::Completed);
        }

        let certificate = Certificate {
            id: Uuid::new_v4(),
            source: CertificateSource::Upload,
            san: info.san_joined(),
            certificate: config.certificate,
            private_key: config.private_key,
            issuer_certificate: info.issuer_chain,
            cert_url: String::new(),
            cert_stable_url: String::new(),
            workflow_id: ctx.workflow_id,
            workflow_run_id: ctx.run_id,
            workflow_node_id: self.node.id.clone(),
            workflow_output_id: None,
            expire_at: info.not_after,
            created_at: Utc::now(),
        };

        let output = WorkflowOutput::new(ctx.workflow_id, ctx.run_id, &self.node);
        self.outputs
            .save_with_certificate(output, certificate)
            .await
            .map_err(|e| {
                fail(
                    &self.logger,
                    "failed to save certificate",
                    NodeError::repository("save workflow output", e),
                )
            })?;

        self.logger.info(format!(
            "certificate for {} stored, expires {}",
            info.san.join(", "),
            info.not_after.to_rfc3339()
        ));
        Ok(NodeOutcome::Completed)
    }

    fn logger(&self) -> &NodeLogger {
        &self.logger
    }
}
