//! In-memory repositories.
//!
//! Backs every repository contract with one shared, lock-protected state so
//! certificates saved by an apply node are visible to a later deploy node.
//! Used by tests and by embedders that do not need durable storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::collaborators::{
    AccessRepository, CertificateRepository, SettingsRepository, StatisticsRepository,
    WorkflowOutputRepository,
};
use crate::models::{Access, Certificate, CertificateStatistics, Settings, WorkflowOutput};
use crate::RepositoryError;

#[derive(Debug, Default)]
struct MemoryState {
    certificates: Vec<Certificate>,
    outputs: Vec<WorkflowOutput>,
    settings: HashMap<String, Settings>,
    accesses: HashMap<String, Access>,
}

/// Cloneable handle; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepositories {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(self, settings: Settings) -> Self {
        self.state
            .write()
            .settings
            .insert(settings.name.clone(), settings);
        self
    }

    pub fn with_access(self, access: Access) -> Self {
        self.state.write().accesses.insert(access.id.clone(), access);
        self
    }

    pub fn insert_certificate(&self, certificate: Certificate) {
        self.state.write().certificates.push(certificate);
    }

    pub fn insert_output(&self, output: WorkflowOutput) {
        self.state.write().outputs.push(output);
    }

    /// All stored certificates, oldest first.
    pub fn certificates(&self) -> Vec<Certificate> {
        self.state.read().certificates.clone()
    }

    /// All stored outputs, oldest first.
    pub fn outputs(&self) -> Vec<WorkflowOutput> {
        self.state.read().outputs.clone()
    }
}

#[async_trait]
impl CertificateRepository for MemoryRepositories {
    async fn get_by_workflow_node_id(&self, node_id: &str) -> Result<Certificate, RepositoryError> {
        self.state
            .read()
            .certificates
            .iter()
            .rev()
            .find(|c| c.workflow_node_id == node_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl WorkflowOutputRepository for MemoryRepositories {
    async fn get_by_node_id(&self, node_id: &str) -> Result<WorkflowOutput, RepositoryError> {
        self.state
            .read()
            .outputs
            .iter()
            .rev()
            .find(|o| o.node_id == node_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn save(&self, output: WorkflowOutput) -> Result<WorkflowOutput, RepositoryError> {
        self.state.write().outputs.push(output.clone());
        Ok(output)
    }

    async fn save_with_certificate(
        &self,
        output: WorkflowOutput,
        mut certificate: Certificate,
    ) -> Result<WorkflowOutput, RepositoryError> {
        let output = output.with_certificate_ref(certificate.id);
        certificate.workflow_output_id = Some(output.id);

        let mut state = self.state.write();
        state.certificates.push(certificate);
        state.outputs.push(output.clone());
        Ok(output)
    }
}

#[async_trait]
impl SettingsRepository for MemoryRepositories {
    async fn get_by_name(&self, name: &str) -> Result<Settings, RepositoryError> {
        self.state
            .read()
            .settings
            .get(name)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl AccessRepository for MemoryRepositories {
    async fn get_by_id(&self, id: &str) -> Result<Access, RepositoryError> {
        self.state
            .read()
            .accesses
            .get(id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl StatisticsRepository for MemoryRepositories {
    async fn certificate_statistics(
        &self,
        now: DateTime<Utc>,
    ) -> Result<CertificateStatistics, RepositoryError> {
        Ok(CertificateStatistics::tally(&self.state.read().certificates, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CertificateSource, NodeType, WorkflowNode};
    use chrono::TimeDelta;
    use serde_json::json;
    use uuid::Uuid;

    fn certificate(node_id: &str) -> Certificate {
        Certificate {
            id: Uuid::new_v4(),
            source: CertificateSource::Workflow,
            san: "example.com".into(),
            certificate: "CERT".into(),
            private_key: "KEY".into(),
            issuer_certificate: String::new(),
            cert_url: String::new(),
            cert_stable_url: String::new(),
            workflow_id: Uuid::new_v4(),
            workflow_run_id: Uuid::new_v4(),
            workflow_node_id: node_id.into(),
            workflow_output_id: None,
            expire_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_with_certificate_links_both_records() {
        let repos = MemoryRepositories::new();
        let node = WorkflowNode::new("apply", "Apply", NodeType::Apply, json!({}));
        let output = WorkflowOutput::new(Uuid::new_v4(), Uuid::new_v4(), &node);
        let cert = certificate("apply");
        let cert_id = cert.id;

        let saved = repos.save_with_certificate(output, cert).await.unwrap();

        let stored = repos.get_by_workflow_node_id("apply").await.unwrap();
        assert_eq!(stored.id, cert_id);
        assert_eq!(stored.workflow_output_id, Some(saved.id));
        assert_eq!(saved.certificate_ref(), Some(cert_id));
        assert_eq!(repos.get_by_node_id("apply").await.unwrap(), saved);
    }

    #[tokio::test]
    async fn latest_record_wins() {
        let repos = MemoryRepositories::new();
        let older = certificate("apply");
        let newer = certificate("apply");
        let newer_id = newer.id;
        repos.insert_certificate(older);
        repos.insert_certificate(newer);

        assert_eq!(repos.get_by_workflow_node_id("apply").await.unwrap().id, newer_id);
    }

    #[tokio::test]
    async fn statistics_count_every_stored_certificate() {
        let repos = MemoryRepositories::new();
        let now = Utc::now();
        for days in [-1, 4, 60, 200] {
            let mut cert = certificate("apply");
            cert.expire_at = now + TimeDelta::days(days);
            repos.insert_certificate(cert);
        }

        let stats = repos.certificate_statistics(now).await.unwrap();

        assert_eq!(
            stats,
            CertificateStatistics {
                total: 4,
                expiring_soon: 1,
                expired: 1,
            }
        );
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let repos = MemoryRepositories::new();

        assert_eq!(
            repos.get_by_workflow_node_id("nope").await,
            Err(RepositoryError::NotFound)
        );
        assert_eq!(repos.get_by_node_id("nope").await, Err(RepositoryError::NotFound));
        assert_eq!(
            SettingsRepository::get_by_name(&repos, "notifyChannels").await,
            Err(RepositoryError::NotFound)
        );
        assert_eq!(
            AccessRepository::get_by_id(&repos, "acc").await,
            Err(RepositoryError::NotFound)
        );
    }
}
