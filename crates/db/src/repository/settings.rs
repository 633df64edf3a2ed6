//! Settings and access lookups.

use sqlx::PgPool;

use nodes::models::{Access, Settings};

use crate::models::{AccessRow, SettingsRow};
use crate::DbError;

pub async fn get_settings_by_name(pool: &PgPool, name: &str) -> Result<Settings, DbError> {
    let row = sqlx::query_as::<_, SettingsRow>(
        r#"SELECT id, name, content, updated_at FROM settings WHERE name = $1"#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row.into())
}

pub async fn get_access_by_id(pool: &PgPool, id: &str) -> Result<Access, DbError> {
    let row = sqlx::query_as::<_, AccessRow>(
        r#"SELECT id, name, provider, config FROM accesses WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row.into())
}
