//! Deploy node: push an upstream certificate to a target through a
//! registered deployer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use super::{fail, optional, record_failed_output, resolve_provider_config};
use crate::collaborators::{AccessRepository, CertificateRepository, WorkflowOutputRepository};
use crate::dispatcher::Collaborators;
use crate::log::NodeLogger;
use crate::models::{Certificate, DeployNodeConfig, WorkflowNode, WorkflowOutput};
use crate::registry::ProviderRegistry;
use crate::traits::{NodeOutcome, NodeProcessor};
use crate::{NodeError, RunContext};

pub struct DeployNode {
    node: WorkflowNode,
    logger: NodeLogger,
    certificates: Arc<dyn CertificateRepository>,
    outputs: Arc<dyn WorkflowOutputRepository>,
    accesses: Arc<dyn AccessRepository>,
    providers: Arc<ProviderRegistry>,
}

impl DeployNode {
    pub fn new(node: WorkflowNode, collab: &Collaborators) -> Self {
        let logger = NodeLogger::new(&node);
        Self {
            node,
            logger,
            certificates: collab.certificates.clone(),
            outputs: collab.outputs.clone(),
            accesses: collab.accesses.clone(),
            providers: collab.providers.clone(),
        }
    }

    /// True when this node already deployed exactly this certificate with
    /// the same configuration and that deploy succeeded.
    async fn already_deployed(&self, certificate: &Certificate) -> Result<bool, NodeError> {
        let last = optional(self.outputs.get_by_node_id(&self.node.id).await).map_err(|e| {
            fail(
                &self.logger,
                "failed to load previous output",
                NodeError::repository("get workflow output", e),
            )
        })?;

        Ok(last.is_some_and(|last| {
            last.succeeded
                && last.node_config == self.node.config
                && last.certificate_ref() == Some(certificate.id)
        }))
    }
}

#[async_trait]
impl NodeProcessor for DeployNode {
    #[instrument(skip_all, fields(node_id = %self.node.id, run_id = %ctx.run_id))]
    async fn process(&self, ctx: &RunContext) -> Result<NodeOutcome, NodeError> {
        self.logger.info("entering deploy node");

        let config: DeployNodeConfig = self
            .node
            .config_as()
            .and_then(|c: DeployNodeConfig| c.validate().map(|_| c))
            .map_err(|e| fail(&self.logger, "invalid deploy node config", e))?;
        let source = config.source_node_id()?;

        let certificate = self
            .certificates
            .get_by_workflow_node_id(source)
            .await
            .map_err(|e| {
                fail(
                    &self.logger,
                    &format!("failed to load certificate produced by '{source}'"),
                    NodeError::repository("get certificate", e),
                )
            })?;

        if config.skip_on_last_succeeded && self.already_deployed(&certificate).await? {
            self.logger
                .info("certificate already deployed by a previous run, skipping");
            return Ok(NodeOutcome::Completed);
        }

        let provider_config = resolve_provider_config(
            self.accesses.as_ref(),
            &self.logger,
            &config.provider_access_id,
            config.provider_config.clone(),
        )
        .await?;

        let deployer = self
            .providers
            .build_deployer(&config.provider, &provider_config, self.logger.clone())
            .map_err(|e| {
                fail(
                    &self.logger,
                    "failed to construct deploy provider",
                    NodeError::ProviderConstruction {
                        kind: "deploy",
                        provider: config.provider.clone(),
                        message: e.to_string(),
                    },
                )
            })?;

        self.logger.info(format!(
            "deploying certificate for {} to {}",
            certificate.san_list().join(", "),
            config.provider
        ));

        let result = match deployer
            .deploy(ctx, &certificate.certificate, &certificate.private_key)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                let err = fail(
                    &self.logger,
                    "failed to deploy certificate",
                    NodeError::external(format!("{}.deploy", config.provider), e),
                );
                if !err.is_cancelled() {
                    record_failed_output(
                        self.outputs.as_ref(),
                        &self.logger,
                        ctx,
                        &self.node,
                        Some(certificate.id),
                    )
                    .await;
                }
                return Err(err);
            }
        };

        let output = WorkflowOutput::new(ctx.workflow_id, ctx.run_id, &self.node)
            .with_certificate_ref(certificate.id);
        self.outputs.save(output).await.map_err(|e| {
            fail(
                &self.logger,
                "failed to save deploy output",
                NodeError::repository("save workflow output", e),
            )
        })?;

        if result.details.is_empty() {
            self.logger.info("certificate deployed");
        } else {
            self.logger.info(format!(
                "certificate deployed: {}",
                serde_json::Value::Object(result.details)
            ));
        }
        Ok(NodeOutcome::Completed)
    }

    fn logger(&self) -> &NodeLogger {
        &self.logger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Deployer;
    use crate::memory::MemoryRepositories;
    use crate::mock::{fixture_certificate, MockAcmeClient, MockDeployer, MockNotifier};
    use crate::models::NodeType;
    use serde_json::{json, Value};
    use std::time::Duration;
    use uuid::Uuid;

    fn deploy_node(config: Value) -> WorkflowNode {
        WorkflowNode::new("deploy-1", "Push to CDN", NodeType::Deploy, config)
    }

    fn deploy_config() -> Value {
        json!({ "certificate": "apply-1#certificate", "provider": "mock" })
    }

    fn collaborators(repos: &MemoryRepositories, deployer: Arc<MockDeployer>) -> Collaborators {
        let mut providers = ProviderRegistry::new();
        providers.register_deployer("mock", move |_, _| Ok(deployer.clone() as Arc<dyn Deployer>));
        Collaborators::in_memory(
            repos.clone(),
            Arc::new(MockAcmeClient::failing("unused")),
            Arc::new(MockNotifier::succeeding()),
        )
        .with_providers(providers)
    }

    fn ctx() -> RunContext {
        RunContext::new(Uuid::new_v4(), Uuid::new_v4())
    }

    #[tokio::test]
    async fn deploys_upstream_certificate_and_records_output() {
        let repos = MemoryRepositories::new();
        let cert = fixture_certificate("apply-1");
        repos.insert_certificate(cert.clone());
        let deployer = Arc::new(MockDeployer::succeeding());
        let node = DeployNode::new(deploy_node(deploy_config()), &collaborators(&repos, deployer.clone()));

        assert_eq!(node.process(&ctx()).await, Ok(NodeOutcome::Completed));

        assert_eq!(deployer.calls.lock().clone(), vec![cert.certificate.clone()]);
        let outputs = repos.outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].node_id, "deploy-1");
        assert_eq!(outputs[0].certificate_ref(), Some(cert.id));
        assert!(node.get_log().error.is_none());
    }

    #[tokio::test]
    async fn missing_upstream_certificate_fails_without_deploying() {
        let repos = MemoryRepositories::new();
        let deployer = Arc::new(MockDeployer::succeeding());
        let node = DeployNode::new(deploy_node(deploy_config()), &collaborators(&repos, deployer.clone()));

        let err = node.process(&ctx()).await.unwrap_err();

        assert!(matches!(err, NodeError::Repository { operation: "get certificate", .. }));
        assert_eq!(deployer.call_count(), 0);
        assert_eq!(node.get_log().error, Some(err.to_string()));
    }

    #[tokio::test]
    async fn skips_certificate_already_deployed() {
        let repos = MemoryRepositories::new();
        repos.insert_certificate(fixture_certificate("apply-1"));
        let deployer = Arc::new(MockDeployer::succeeding());
        let collab = collaborators(&repos, deployer.clone());
        let mut config = deploy_config();
        config["skipOnLastSucceeded"] = json!(true);

        DeployNode::new(deploy_node(config.clone()), &collab)
            .process(&ctx())
            .await
            .unwrap();
        let second = DeployNode::new(deploy_node(config), &collab);
        second.process(&ctx()).await.unwrap();

        assert_eq!(deployer.call_count(), 1);
        assert!(second
            .get_log()
            .records
            .iter()
            .any(|r| r.content.contains("skipping")));
    }

    #[tokio::test]
    async fn redeploys_when_a_new_certificate_was_issued() {
        let repos = MemoryRepositories::new();
        repos.insert_certificate(fixture_certificate("apply-1"));
        let deployer = Arc::new(MockDeployer::succeeding());
        let collab = collaborators(&repos, deployer.clone());
        let mut config = deploy_config();
        config["skipOnLastSucceeded"] = json!(true);

        DeployNode::new(deploy_node(config.clone()), &collab)
            .process(&ctx())
            .await
            .unwrap();
        repos.insert_certificate(fixture_certificate("apply-1"));
        DeployNode::new(deploy_node(config), &collab)
            .process(&ctx())
            .await
            .unwrap();

        assert_eq!(deployer.call_count(), 2);
    }

    #[tokio::test]
    async fn deployer_failure_is_external() {
        let repos = MemoryRepositories::new();
        repos.insert_certificate(fixture_certificate("apply-1"));
        let deployer = Arc::new(MockDeployer::failing("403 forbidden"));
        let node = DeployNode::new(deploy_node(deploy_config()), &collaborators(&repos, deployer));

        let err = node.process(&ctx()).await.unwrap_err();

        assert!(matches!(err, NodeError::External { ref call, .. } if call == "mock.deploy"));
        assert_eq!(node.get_log().error, Some(err.to_string()));

        let outputs = repos.outputs();
        assert_eq!(outputs.len(), 1);
        assert!(!outputs[0].succeeded);
        assert_eq!(outputs[0].node_id, "deploy-1");
    }

    #[tokio::test]
    async fn failed_deploy_is_retried_even_when_skipping_is_enabled() {
        let repos = MemoryRepositories::new();
        let cert = fixture_certificate("apply-1");
        repos.insert_certificate(cert.clone());
        let working = Arc::new(MockDeployer::succeeding());
        let broken = Arc::new(MockDeployer::failing("connection reset"));
        let mut config = deploy_config();
        config["skipOnLastSucceeded"] = json!(true);

        DeployNode::new(deploy_node(config.clone()), &collaborators(&repos, working.clone()))
            .process(&ctx())
            .await
            .unwrap();
        DeployNode::new(deploy_node(config.clone()), &collaborators(&repos, broken.clone()))
            .process(&ctx())
            .await
            .unwrap_err();
        let third = DeployNode::new(deploy_node(config), &collaborators(&repos, working.clone()));
        third.process(&ctx()).await.unwrap();

        assert_eq!(working.call_count(), 2);
        assert_eq!(broken.call_count(), 1);
        let succeeded: Vec<bool> = repos.outputs().iter().map(|o| o.succeeded).collect();
        assert_eq!(succeeded, vec![true, false, true]);
        assert_eq!(repos.outputs()[1].certificate_ref(), Some(cert.id));
        assert!(!third
            .get_log()
            .records
            .iter()
            .any(|r| r.content.contains("skipping")));
    }

    #[tokio::test]
    async fn unknown_deploy_target_is_a_construction_error() {
        let repos = MemoryRepositories::new();
        repos.insert_certificate(fixture_certificate("apply-1"));
        let deployer = Arc::new(MockDeployer::succeeding());
        let mut config = deploy_config();
        config["provider"] = json!("k8s-secret");
        let node = DeployNode::new(deploy_node(config), &collaborators(&repos, deployer.clone()));

        let err = node.process(&ctx()).await.unwrap_err();

        assert!(matches!(err, NodeError::ProviderConstruction { kind: "deploy", .. }));
        assert_eq!(deployer.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_deploy_is_reported_as_cancelled() {
        let repos = MemoryRepositories::new();
        repos.insert_certificate(fixture_certificate("apply-1"));
        let deployer = Arc::new(MockDeployer::waiting_for_cancel());
        let node = DeployNode::new(deploy_node(deploy_config()), &collaborators(&repos, deployer));
        let ctx = ctx();

        let canceller = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            ctx.cancel();
        };
        let (result, _) = tokio::join!(node.process(&ctx), canceller);

        assert_eq!(result, Err(NodeError::Cancelled));
        assert!(repos.outputs().is_empty());
    }
}
