//! `db` crate — Postgres persistence layer.
//!
//! Provides a connection pool, typed row structs, repository functions for
//! every table in the certificate workflow schema, and [`PgRepositories`],
//! which plugs those functions into the `nodes` and `engine` contracts.
//! No business logic lives here.

pub mod error;
pub mod models;
pub mod pool;
pub mod repository;

pub use error::DbError;
pub use pool::{create_pool, run_migrations, DbConfig, DbPool};
pub use repository::PgRepositories;
