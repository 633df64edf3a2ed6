//! Run persistence contract and its in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use nodes::RepositoryError;

use crate::models::WorkflowRun;

/// Stores run records. The runner creates the record when the walk starts
/// and updates it after every node and once more when the run finishes.
#[async_trait]
pub trait WorkflowRunRepository: Send + Sync {
    async fn create(&self, run: &WorkflowRun) -> Result<(), RepositoryError>;
    async fn update(&self, run: &WorkflowRun) -> Result<(), RepositoryError>;
    async fn get(&self, id: Uuid) -> Result<WorkflowRun, RepositoryError>;
}

#[derive(Debug, Default)]
pub struct MemoryRunRepository {
    runs: RwLock<HashMap<Uuid, WorkflowRun>>,
}

impl MemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowRunRepository for MemoryRunRepository {
    async fn create(&self, run: &WorkflowRun) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write();
        if runs.contains_key(&run.id) {
            return Err(RepositoryError::Backend(format!("run {} already exists", run.id)));
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn update(&self, run: &WorkflowRun) -> Result<(), RepositoryError> {
        match self.runs.write().get_mut(&run.id) {
            Some(stored) => {
                *stored = run.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn get(&self, id: Uuid) -> Result<WorkflowRun, RepositoryError> {
        self.runs
            .read()
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }
}
