//! One processor per node kind.

pub mod apply;
pub mod condition;
pub mod deploy;
pub mod execute_result;
pub mod notify;
pub mod start;
pub mod upload;

pub use apply::ApplyNode;
pub use condition::ConditionNode;
pub use deploy::DeployNode;
pub use execute_result::{ExecuteFailureNode, ExecuteSuccessNode};
pub use notify::NotifyNode;
pub use start::StartNode;
pub use upload::UploadNode;

use serde_json::Value;
use uuid::Uuid;

use crate::collaborators::{AccessRepository, WorkflowOutputRepository};
use crate::log::NodeLogger;
use crate::models::{WorkflowNode, WorkflowOutput};
use crate::registry::ProviderConfig;
use crate::{NodeError, RepositoryError, RunContext};

/// Record `err` in the node log under `content` and hand it back, so call
/// sites read `.map_err(|e| fail(&self.logger, "...", e))?`.
pub(crate) fn fail(logger: &NodeLogger, content: &str, err: NodeError) -> NodeError {
    if err.is_cancelled() {
        logger.error(format!("{content}: run cancelled"), &err);
    } else {
        logger.error(content, &err);
    }
    err
}

/// `Ok(None)` for a missing record, the error otherwise.
pub(crate) fn optional<T>(result: Result<T, RepositoryError>) -> Result<Option<T>, RepositoryError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(RepositoryError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Merge stored access credentials with node-level provider options.
pub(crate) async fn resolve_provider_config(
    accesses: &dyn AccessRepository,
    logger: &NodeLogger,
    access_id: &str,
    options: Value,
) -> Result<ProviderConfig, NodeError> {
    let access = if access_id.trim().is_empty() {
        None
    } else {
        let access = accesses.get_by_id(access_id).await.map_err(|e| {
            fail(
                logger,
                "failed to load provider access",
                NodeError::repository("get access", e),
            )
        })?;
        Some(access)
    };

    Ok(ProviderConfig { access, options })
}

/// Store a failed output for `node` so a later run does not mistake an older
/// success for the current state. A storage error is only logged as a
/// warning; the caller still returns its original error.
pub(crate) async fn record_failed_output(
    outputs: &dyn WorkflowOutputRepository,
    logger: &NodeLogger,
    ctx: &RunContext,
    node: &WorkflowNode,
    certificate_ref: Option<Uuid>,
) {
    let mut output = WorkflowOutput::new(ctx.workflow_id, ctx.run_id, node).failed();
    if let Some(id) = certificate_ref {
        output = output.with_certificate_ref(id);
    }
    if let Err(e) = outputs.save(output).await {
        logger.warn(format!("failed to record failed output: {e}"));
    }
}
