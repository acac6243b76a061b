//! Database layer: connection pool, migrations, models and repositories.
//!
//! Every tenant-scoped repository method takes an explicit
//! [`TenantId`](dunlin_core::tenant::TenantId) parameter; cross-tenant reads
//! require a [`Sudo`](dunlin_core::tenant::Sudo) token. There is no implicit
//! query rewriting anywhere.

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run all pending migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Verify the database connection is alive.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Whether `err` is a violation of the named unique constraint.
///
/// Sync and staging treat specific unique violations as "row already
/// exists" rather than failures, so classification keys on the constraint
/// name from the migrations.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint() == Some(constraint),
        _ => false,
    }
}
