//! Postgres-backed record store.

mod cloudpcs;
mod platform_config;
mod users;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::application::repos::RepoError;

/// Shared connection pool behind every repository trait.
pub struct PgRepositories {
    pool: PgPool,
}

impl PgRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    /// Liveness probe for the health endpoint.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Normalize database errors, surfacing unique-constraint violations as
/// duplicates.
pub(crate) fn map_db_err(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db_err) => match db_err.constraint() {
            Some(constraint) => RepoError::Duplicate {
                constraint: constraint.to_owned(),
            },
            None => RepoError::from_persistence(db_err),
        },
        other => RepoError::from_persistence(other),
    }
}
