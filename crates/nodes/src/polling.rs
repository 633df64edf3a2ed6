//! Bounded, fixed-interval polling for server-paced deployments.
//!
//! A deployment record reports task counts. The loop ends when every task
//! has either succeeded or failed. Cancellation is checked before each query
//! and raced against each sleep, so a cancelled run stops within one interval
//! and issues no further queries. There is no backoff and no timeout of its
//! own; the run context's cancellation is the only outer bound.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::log::NodeLogger;
use crate::{ProviderError, RunContext};

/// Task counts of one deployment record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentProgress {
    pub success: Option<u64>,
    pub failed: Option<u64>,
    pub total: Option<u64>,
}

impl DeploymentProgress {
    pub fn new(success: u64, failed: u64, total: u64) -> Self {
        Self {
            success: Some(success),
            failed: Some(failed),
            total: Some(total),
        }
    }

    /// `Ok(true)` once `success + failed == total`. A record without a
    /// total, or whose finished count overflows or exceeds the total, can
    /// never settle and is reported as `Err` with a description.
    pub fn is_settled(&self) -> Result<bool, String> {
        let total = self
            .total
            .ok_or_else(|| "reported no total task count".to_owned())?;
        let success = self.success.unwrap_or(0);
        let failed = self.failed.unwrap_or(0);
        let done = success.checked_add(failed).ok_or_else(|| {
            format!("reported task counts that overflow: {success} succeeded, {failed} failed")
        })?;
        if done > total {
            return Err(format!("reported {done} finished tasks out of {total}"));
        }
        Ok(done == total)
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.unwrap_or(0)
    }
}

/// Source of deployment record status, typically a vendor "describe
/// deployment record" endpoint.
#[async_trait]
pub trait DeploymentStatusSource: Send + Sync {
    async fn fetch(&self, ctx: &RunContext, record_id: &str)
        -> Result<DeploymentProgress, ProviderError>;
}

/// Polling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed wait between queries.
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// Poll `source` until the deployment record settles.
pub async fn poll_until_settled(
    ctx: &RunContext,
    source: &dyn DeploymentStatusSource,
    record_id: &str,
    policy: PollPolicy,
    logger: &NodeLogger,
) -> Result<DeploymentProgress, ProviderError> {
    loop {
        if ctx.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let progress = source.fetch(ctx, record_id).await?;
        match progress.is_settled() {
            Err(reason) => {
                return Err(ProviderError::request(
                    "describe deployment record",
                    format!("record {record_id} {reason}"),
                ));
            }
            Ok(true) => {
                logger.info(format!(
                    "deployment record {record_id} settled: {} succeeded, {} failed",
                    progress.success.unwrap_or(0),
                    progress.failed_count()
                ));
                return Ok(progress);
            }
            Ok(false) => {
                logger.info(format!("deployment record {record_id} still in progress"));
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(policy.interval) => {}
            _ = ctx.cancelled() => return Err(ProviderError::Cancelled),
        }
    }
}
