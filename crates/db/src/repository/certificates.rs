//! Certificate rows.

use sqlx::{PgPool, Postgres};

use nodes::models::Certificate;

use crate::{models::CertificateRow, DbError};

const CERTIFICATE_COLUMNS: &str = "id, source, san, certificate, private_key, issuer_certificate, \
     cert_url, cert_stable_url, workflow_id, workflow_run_id, workflow_node_id, \
     workflow_output_id, expire_at, created_at";

/// Insert a certificate. Accepts the pool or an open transaction.
pub async fn insert_certificate<'e, E>(executor: E, certificate: &Certificate) -> Result<(), DbError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = CertificateRow::from(certificate);

    sqlx::query(&format!(
        "INSERT INTO certificates ({CERTIFICATE_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
    ))
    .bind(row.id)
    .bind(&row.source)
    .bind(&row.san)
    .bind(&row.certificate)
    .bind(&row.private_key)
    .bind(&row.issuer_certificate)
    .bind(&row.cert_url)
    .bind(&row.cert_stable_url)
    .bind(row.workflow_id)
    .bind(row.workflow_run_id)
    .bind(&row.workflow_node_id)
    .bind(row.workflow_output_id)
    .bind(row.expire_at)
    .bind(row.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Most recent certificate produced by the given workflow node.
pub async fn get_latest_by_workflow_node_id(
    pool: &PgPool,
    node_id: &str,
) -> Result<Certificate, DbError> {
    let row = sqlx::query_as::<_, CertificateRow>(&format!(
        "SELECT {CERTIFICATE_COLUMNS} FROM certificates \
         WHERE workflow_node_id = $1 ORDER BY created_at DESC LIMIT 1"
    ))
    .bind(node_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Certificate::try_from(row)
}
