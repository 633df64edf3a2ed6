//! Repository functions, one per database operation, plus [`PgRepositories`]
//! which exposes them through the collaborator traits used by the node
//! processors and the workflow runner.
//!
//! The free functions take a `&DbPool` and return `Result<T, DbError>`.

pub mod certificates;
pub mod outputs;
pub mod runs;
pub mod settings;
pub mod statistics;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use engine::models::WorkflowRun;
use engine::WorkflowRunRepository;
use nodes::collaborators::{
    AccessRepository, CertificateRepository, SettingsRepository, StatisticsRepository,
    WorkflowOutputRepository,
};
use nodes::models::{Access, Certificate, CertificateStatistics, Settings, WorkflowOutput};
use nodes::RepositoryError;

use crate::DbPool;

/// Postgres-backed implementation of every repository contract.
#[derive(Debug, Clone)]
pub struct PgRepositories {
    pool: DbPool,
}

impl PgRepositories {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CertificateRepository for PgRepositories {
    async fn get_by_workflow_node_id(&self, node_id: &str) -> Result<Certificate, RepositoryError> {
        Ok(certificates::get_latest_by_workflow_node_id(&self.pool, node_id).await?)
    }
}

#[async_trait]
impl WorkflowOutputRepository for PgRepositories {
    async fn get_by_node_id(&self, node_id: &str) -> Result<WorkflowOutput, RepositoryError> {
        Ok(outputs::get_latest_by_node_id(&self.pool, node_id).await?)
    }

    async fn save(&self, output: WorkflowOutput) -> Result<WorkflowOutput, RepositoryError> {
        outputs::insert_output(&self.pool, &output).await?;
        Ok(output)
    }

    async fn save_with_certificate(
        &self,
        output: WorkflowOutput,
        certificate: Certificate,
    ) -> Result<WorkflowOutput, RepositoryError> {
        Ok(outputs::save_with_certificate(&self.pool, output, certificate).await?)
    }
}

#[async_trait]
impl SettingsRepository for PgRepositories {
    async fn get_by_name(&self, name: &str) -> Result<Settings, RepositoryError> {
        Ok(settings::get_settings_by_name(&self.pool, name).await?)
    }
}

#[async_trait]
impl AccessRepository for PgRepositories {
    async fn get_by_id(&self, id: &str) -> Result<Access, RepositoryError> {
        Ok(settings::get_access_by_id(&self.pool, id).await?)
    }
}

#[async_trait]
impl StatisticsRepository for PgRepositories {
    async fn certificate_statistics(
        &self,
        now: DateTime<Utc>,
    ) -> Result<CertificateStatistics, RepositoryError> {
        Ok(statistics::certificate_statistics(&self.pool, now).await?)
    }
}

#[async_trait]
impl WorkflowRunRepository for PgRepositories {
    async fn create(&self, run: &WorkflowRun) -> Result<(), RepositoryError> {
        Ok(runs::create_run(&self.pool, run).await?)
    }

    async fn update(&self, run: &WorkflowRun) -> Result<(), RepositoryError> {
        Ok(runs::update_run(&self.pool, run).await?)
    }

    async fn get(&self, id: Uuid) -> Result<WorkflowRun, RepositoryError> {
        Ok(runs::get_run(&self.pool, id).await?)
    }
}
