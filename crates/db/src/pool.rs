//! Postgres connection pool.

use std::env;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::DbError;

/// Type alias for the shared Postgres pool used across the whole application.
pub type DbPool = PgPool;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Connection settings for [`create_pool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Read `DATABASE_URL` (required) and `DATABASE_MAX_CONNECTIONS`
    /// (optional, defaults to 10).
    pub fn from_env() -> Result<Self, DbError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DbError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| DbError::Config("DATABASE_URL is not set".into()))?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                DbError::Config(format!("DATABASE_MAX_CONNECTIONS is not a number: '{raw}'"))
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url,
            max_connections,
        })
    }
}

/// Create a new connection pool from `config`.
pub async fn create_pool(config: &DbConfig) -> Result<DbPool, DbError> {
    info!(
        "Connecting to database (max_connections={})",
        config.max_connections
    );
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

/// Run embedded SQLx migrations located in `./migrations` (relative to the
/// workspace root at build time).
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    info!("Running database migrations");
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn url_is_required() {
        assert!(matches!(DbConfig::from_lookup(lookup(&[])), Err(DbError::Config(_))));
    }

    #[test]
    fn max_connections_defaults_and_parses() {
        let config = DbConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/certs")])).unwrap();
        assert_eq!(config, DbConfig::new("postgres://localhost/certs"));

        let config = DbConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/certs"),
            ("DATABASE_MAX_CONNECTIONS", "32"),
        ]))
        .unwrap();
        assert_eq!(config.max_connections, 32);

        let bad = DbConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/certs"),
            ("DATABASE_MAX_CONNECTIONS", "lots"),
        ]));
        assert!(bad.is_err());
    }
}
