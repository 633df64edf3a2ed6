//! Workflow run records.

use sqlx::PgPool;
use uuid::Uuid;

use engine::models::WorkflowRun;

use crate::{models::WorkflowRunRow, DbError};

const RUN_COLUMNS: &str = "id, workflow_id, status, logs, error, started_at, ended_at";

pub async fn create_run(pool: &PgPool, run: &WorkflowRun) -> Result<(), DbError> {
    let row = WorkflowRunRow::from_run(run)?;

    sqlx::query(
        r#"
        INSERT INTO workflow_runs (id, workflow_id, status, logs, error, started_at, ended_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(row.id)
    .bind(row.workflow_id)
    .bind(&row.status)
    .bind(&row.logs)
    .bind(&row.error)
    .bind(row.started_at)
    .bind(row.ended_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrite status, logs, error and end time of an existing run.
pub async fn update_run(pool: &PgPool, run: &WorkflowRun) -> Result<(), DbError> {
    let row = WorkflowRunRow::from_run(run)?;

    let result = sqlx::query(
        r#"
        UPDATE workflow_runs
        SET status = $2, logs = $3, error = $4, ended_at = $5
        WHERE id = $1
        "#,
    )
    .bind(row.id)
    .bind(&row.status)
    .bind(&row.logs)
    .bind(&row.error)
    .bind(row.ended_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

pub async fn get_run(pool: &PgPool, id: Uuid) -> Result<WorkflowRun, DbError> {
    let row = sqlx::query_as::<_, WorkflowRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM workflow_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    row.into_run()
}

