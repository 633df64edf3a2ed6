//! Typed error type for the db crate.

use thiserror::Error;

use nodes::RepositoryError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("row not found")]
    NotFound,

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be mapped back onto its domain type.
    #[error("corrupt row in '{table}': {message}")]
    Decode { table: &'static str, message: String },

    #[error("invalid database config: {0}")]
    Config(String),
}

impl DbError {
    pub(crate) fn decode(table: &'static str, message: impl ToString) -> Self {
        Self::Decode {
            table,
            message: message.to_string(),
        }
    }
}

impl From<DbError> for RepositoryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound | DbError::Sqlx(sqlx::Error::RowNotFound) => RepositoryError::NotFound,
            other => RepositoryError::Backend(other.to_string()),
        }
    }
}
