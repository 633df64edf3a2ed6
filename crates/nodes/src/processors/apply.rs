//! Apply node: obtain (or renew) a certificate through ACME DNS-01.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{fail, optional, resolve_provider_config};
use crate::certs;
use crate::collaborators::{
    AccessRepository, AcmeClient, CertificateRepository, CertificateRequest,
    WorkflowOutputRepository,
};
use crate::dispatcher::Collaborators;
use crate::log::NodeLogger;
use crate::models::{
    validity_window, ApplyNodeConfig, Certificate, CertificateSource, CertificateStatus,
    WorkflowNode, WorkflowOutput,
};
use crate::registry::ProviderRegistry;
use crate::traits::{NodeOutcome, NodeProcessor};
use crate::{NodeError, RunContext};

pub struct ApplyNode {
    node: WorkflowNode,
    logger: NodeLogger,
    certificates: Arc<dyn CertificateRepository>,
    outputs: Arc<dyn WorkflowOutputRepository>,
    accesses: Arc<dyn AccessRepository>,
    providers: Arc<ProviderRegistry>,
    acme: Arc<dyn AcmeClient>,
}

impl ApplyNode {
    pub fn new(node: WorkflowNode, collab: &Collaborators) -> Self {
        let logger = NodeLogger::new(&node);
        Self {
            node,
            logger,
            certificates: collab.certificates.clone(),
            outputs: collab.outputs.clone(),
            accesses: collab.accesses.clone(),
            providers: collab.providers.clone(),
            acme: collab.acme.clone(),
        }
    }

    /// Returns a skip reason when the last issuance for this node is still
    /// usable: it succeeded, was made with the same configuration, and its
    /// certificate is not yet inside the renewal window.
    async fn skip_reason(&self, config: &ApplyNodeConfig) -> Result<Option<String>, NodeError> {
        let last = optional(self.outputs.get_by_node_id(&self.node.id).await).map_err(|e| {
            fail(
                &self.logger,
                "failed to load previous output",
                NodeError::repository("get workflow output", e),
            )
        })?;
        let Some(last) = last else {
            return Ok(None);
        };
        if !last.succeeded || last.node_config != self.node.config {
            debug!(node_id = %self.node.id, "configuration changed since last issuance");
            return Ok(None);
        }

        let current = optional(self.certificates.get_by_workflow_node_id(&self.node.id).await)
            .map_err(|e| {
                fail(
                    &self.logger,
                    "failed to load current certificate",
                    NodeError::repository("get certificate", e),
                )
            })?;
        let Some(current) = current else {
            return Ok(None);
        };

        let window = if config.skip_before_expiry_days > 0 {
            TimeDelta::days(config.skip_before_expiry_days)
        } else {
            validity_window()
        };
        if current.status_within(Utc::now(), window) != CertificateStatus::Valid {
            return Ok(None);
        }

        Ok(Some(format!(
            "certificate still valid until {}, skipping renewal",
            current.expire_at.to_rfc3339()
        )))
    }
}

#[async_trait]
impl NodeProcessor for ApplyNode {
    #[instrument(skip_all, fields(node_id = %self.node.id, run_id = %ctx.run_id))]
    async fn process(&self, ctx: &RunContext) -> Result<NodeOutcome, NodeError> {
        self.logger.info("entering apply node");

        let config: ApplyNodeConfig = self
            .node
            .config_as()
            .and_then(|c: ApplyNodeConfig| c.validate().map(|_| c))
            .map_err(|e| fail(&self.logger, "invalid apply node config", e))?;

        if let Some(reason) = self.skip_reason(&config).await? {
            self.logger.info(reason);
            return Ok(NodeOutcome::Completed);
        }

        let provider_config = resolve_provider_config(
            self.accesses.as_ref(),
            &self.logger,
            &config.provider_access_id,
            config.provider_config.clone(),
        )
        .await?;

        let dns = self
            .providers
            .build_dns_provider(&config.provider, &provider_config)
            .map_err(|e| {
                fail(
                    &self.logger,
                    "failed to construct dns provider",
                    NodeError::ProviderConstruction {
                        kind: "dns",
                        provider: config.provider.clone(),
                        message: e.to_string(),
                    },
                )
            })?;

        let propagation = dns.propagation();
        self.logger.info(format!(
            "dns provider '{}' ready: propagation timeout {}s, interval {}s, ttl {}",
            config.provider,
            propagation.timeout.as_secs(),
            propagation.interval.as_secs(),
            propagation.ttl
        ));

        ctx.ensure_active()
            .map_err(|e| fail(&self.logger, "certificate order not started", e))?;

        let request = CertificateRequest {
            domains: config.domain_list(),
            contact_email: config.contact_email.clone(),
            key_algorithm: config.key_algorithm.clone(),
            nameservers: config.nameserver_list(),
        };
        self.logger.info(format!(
            "requesting certificate for {} via {}",
            request.domains.join(", "),
            config.provider
        ));

        let obtained = self
            .acme
            .obtain(ctx, &request, dns.as_ref())
            .await
            .map_err(|e| {
                fail(
                    &self.logger,
                    "failed to obtain certificate",
                    NodeError::external("acme order", e),
                )
            })?;

        let info = certs::inspect_pem(&obtained.certificate_pem)
            .map_err(|e| fail(&self.logger, "issued certificate could not be parsed", e))?;

        let issuer_certificate = if obtained.issuer_certificate_pem.is_empty() {
            info.issuer_chain.clone()
        } else {
            obtained.issuer_certificate_pem
        };

        let certificate = Certificate {
            id: Uuid::new_v4(),
            source: CertificateSource::Workflow,
            san: info.san_joined(),
            certificate: obtained.certificate_pem,
            private_key: obtained.private_key_pem,
            issuer_certificate,
            cert_url: obtained.cert_url,
            cert_stable_url: obtained.cert_stable_url,
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
            "certificate issued for {}, expires {}",
            info.san.join(", "),
            info.not_after.to_rfc3339()
        ));
        Ok(NodeOutcome::Completed)
    }

    fn logger(&self) -> &NodeLogger {
        &self.logger
    }
}
