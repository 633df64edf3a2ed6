//! Dashboard counts.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use nodes::models::{validity_window, CertificateStatistics};

use crate::{models::CertificateStatisticsRow, DbError};

/// Count certificates as of `now`: expired when `expire_at <= now`,
/// expiring soon when inside the validity window.
pub async fn certificate_statistics(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<CertificateStatistics, DbError> {
    let row = sqlx::query_as::<_, CertificateStatisticsRow>(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE expire_at > $1 AND expire_at < $2) AS expiring_soon,
            COUNT(*) FILTER (WHERE expire_at <= $1) AS expired
        FROM certificates
        "#,
    )
    .bind(now)
    .bind(now + validity_window())
    .fetch_one(pool)
    .await?;

    row.try_into()
}
