//! Two-step deployment: upload to a certificate service, then bind.
//!
//! Many targets cannot take PEM material directly. They need the certificate
//! registered with an intermediate certificate-management service first and
//! the returned handle bound to the target resource. [`BindingDeployer`]
//! composes a shared [`Uploader`] with a target-specific [`CertificateBinder`]
//! and, for targets that deploy asynchronously, polls the deployment record
//! until it settles.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::{DeployResult, Deployer, Uploader};
use crate::log::NodeLogger;
use crate::polling::{poll_until_settled, DeploymentStatusSource, PollPolicy};
use crate::{ProviderError, RunContext};

/// Result of binding a certificate handle to a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindResult {
    /// Set when the target deploys asynchronously and must be polled.
    pub record_id: Option<String>,
}

/// Binds an uploaded certificate handle to a target resource.
#[async_trait]
pub trait CertificateBinder: Send + Sync {
    async fn bind(&self, ctx: &RunContext, cert_id: &str) -> Result<BindResult, ProviderError>;
}

/// `submitted -> polling -> {completed | failed}` deployer.
pub struct BindingDeployer {
    uploader: Arc<dyn Uploader>,
    binder: Arc<dyn CertificateBinder>,
    status: Option<Arc<dyn DeploymentStatusSource>>,
    policy: PollPolicy,
    logger: NodeLogger,
}

impl BindingDeployer {
    pub fn new(
        uploader: Arc<dyn Uploader>,
        binder: Arc<dyn CertificateBinder>,
        logger: NodeLogger,
    ) -> Self {
        Self {
            uploader,
            binder,
            status: None,
            policy: PollPolicy::default(),
            logger,
        }
    }

    /// Poll this source whenever a bind returns a deployment record.
    pub fn with_status_source(mut self, status: Arc<dyn DeploymentStatusSource>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl Deployer for BindingDeployer {
    async fn deploy(
        &self,
        ctx: &RunContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<DeployResult, ProviderError> {
        let uploaded = self.uploader.upload(ctx, cert_pem, key_pem).await?;
        self.logger
            .info(format!("certificate uploaded, cert id {}", uploaded.cert_id));

        if ctx.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let bound = self.binder.bind(ctx, &uploaded.cert_id).await?;

        let mut result = DeployResult::default();
        result
            .details
            .insert("certId".into(), uploaded.cert_id.clone().into());

        let (Some(record_id), Some(status)) = (bound.record_id, self.status.as_ref()) else {
            self.logger.info("certificate bound to target");
            return Ok(result);
        };

        self.logger
            .info(format!("deployment record {record_id} submitted"));
        let progress =
            poll_until_settled(ctx, status.as_ref(), &record_id, self.policy, &self.logger).await?;

        if progress.failed_count() > 0 {
            return Err(ProviderError::request(
                "describe deployment record",
                format!(
                    "{} of {} deployment tasks failed",
                    progress.failed_count(),
                    progress.total.unwrap_or(0)
                ),
            ));
        }

        result.details.insert("recordId".into(), record_id.into());
        Ok(result)
    }
}
