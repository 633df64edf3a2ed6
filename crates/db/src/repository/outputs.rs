//! Workflow output rows.

use sqlx::{PgPool, Postgres};
use tracing::debug;

use nodes::models::{Certificate, WorkflowOutput};

use crate::repository::certificates::insert_certificate;
use crate::{models::WorkflowOutputRow, DbError};

/// Insert an output. Accepts the pool or an open transaction.
pub async fn insert_output<'e, E>(executor: E, output: &WorkflowOutput) -> Result<(), DbError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = WorkflowOutputRow::from_output(output)?;

    sqlx::query(
        r#"
        INSERT INTO workflow_outputs
            (id, workflow_id, run_id, node_id, node_config, outputs, succeeded, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(row.id)
    .bind(row.workflow_id)
    .bind(row.run_id)
    .bind(&row.node_id)
    .bind(&row.node_config)
    .bind(&row.outputs)
    .bind(row.succeeded)
    .bind(row.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Most recent output recorded for the given node.
pub async fn get_latest_by_node_id(pool: &PgPool, node_id: &str) -> Result<WorkflowOutput, DbError> {
    let row = sqlx::query_as::<_, WorkflowOutputRow>(
        r#"
        SELECT id, workflow_id, run_id, node_id, node_config, outputs, succeeded, created_at
        FROM workflow_outputs
        WHERE node_id = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(node_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    row.into_output()
}

/// Store an output and the certificate it references in one transaction.
///
/// The stored output carries a `certificate` entry pointing at the
/// certificate and the certificate carries the output id.
pub async fn save_with_certificate(
    pool: &PgPool,
    output: WorkflowOutput,
    mut certificate: Certificate,
) -> Result<WorkflowOutput, DbError> {
    let output = output.with_certificate_ref(certificate.id);
    certificate.workflow_output_id = Some(output.id);

    let mut tx = pool.begin().await?;
    insert_output(&mut *tx, &output).await?;
    insert_certificate(&mut *tx, &certificate).await?;
    tx.commit().await?;

    debug!(output_id = %output.id, certificate_id = %certificate.id, "output and certificate saved");
    Ok(output)
}
