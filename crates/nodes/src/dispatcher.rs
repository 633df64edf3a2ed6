//! Node dispatcher — maps a node's type tag to a fresh processor.

use std::sync::Arc;

use crate::collaborators::{
    AccessRepository, AcmeClient, CertificateRepository, ConditionEvaluator, NotifyChannelSender,
    PointerEvaluator, SettingsRepository, WorkflowOutputRepository,
};
use crate::memory::MemoryRepositories;
use crate::models::{NodeType, WorkflowNode};
use crate::processors::{
    ApplyNode, ConditionNode, DeployNode, ExecuteFailureNode, ExecuteSuccessNode, NotifyNode,
    StartNode, UploadNode,
};
use crate::registry::ProviderRegistry;
use crate::traits::NodeProcessor;
use crate::DispatchError;

/// Everything processors reach outside the core for. Cheap to clone; every
/// field is shared.
#[derive(Clone)]
pub struct Collaborators {
    pub certificates: Arc<dyn CertificateRepository>,
    pub outputs: Arc<dyn WorkflowOutputRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub accesses: Arc<dyn AccessRepository>,
    pub providers: Arc<ProviderRegistry>,
    pub acme: Arc<dyn AcmeClient>,
    pub notifier: Arc<dyn NotifyChannelSender>,
    pub evaluator: Arc<dyn ConditionEvaluator>,
}

impl Collaborators {
    /// All four repositories backed by one in-memory store, an empty
    /// provider registry and the JSON-pointer condition evaluator.
    pub fn in_memory(
        repos: MemoryRepositories,
        acme: Arc<dyn AcmeClient>,
        notifier: Arc<dyn NotifyChannelSender>,
    ) -> Self {
        let repos = Arc::new(repos);
        Self {
            certificates: repos.clone(),
            outputs: repos.clone(),
            settings: repos.clone(),
            accesses: repos,
            providers: Arc::new(ProviderRegistry::new()),
            acme,
            notifier,
            evaluator: Arc::new(PointerEvaluator),
        }
    }

    pub fn with_providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = Arc::new(providers);
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }
}

/// Builds one processor per node per run. Processors are never shared
/// between runs.
#[derive(Clone)]
pub struct NodeDispatcher {
    collab: Collaborators,
}

impl NodeDispatcher {
    pub fn new(collab: Collaborators) -> Self {
        Self { collab }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collab
    }

    /// Fails with [`DispatchError::UnimplementedType`] for an unknown tag.
    pub fn get_processor(
        &self,
        node: &WorkflowNode,
    ) -> Result<Box<dyn NodeProcessor>, DispatchError> {
        let kind: NodeType = node
            .node_type
            .parse()
            .map_err(|_| DispatchError::UnimplementedType(node.node_type.clone()))?;

        let node = node.clone();
        let processor: Box<dyn NodeProcessor> = match kind {
            NodeType::Start => Box::new(StartNode::new(node)),
            NodeType::Condition => Box::new(ConditionNode::new(node, self.collab.evaluator.clone())),
            NodeType::Apply => Box::new(ApplyNode::new(node, &self.collab)),
            NodeType::Upload => Box::new(UploadNode::new(node, &self.collab)),
            NodeType::Deploy => Box::new(DeployNode::new(node, &self.collab)),
            NodeType::Notify => Box::new(NotifyNode::new(node, &self.collab)),
            NodeType::ExecuteSuccess => Box::new(ExecuteSuccessNode::new(node)),
            NodeType::ExecuteFailure => Box::new(ExecuteFailureNode::new(node)),
        };
        Ok(processor)
    }
}
