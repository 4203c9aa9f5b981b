//! Persistence layer: connection handling, row models, repositories, and
//! the event store that owns every status transition.

pub mod models;
pub mod repositories;
pub mod store;

use sqlx::postgres::PgPoolOptions;

/// Shared connection pool handed to every component.
pub type DbPool = sqlx::PgPool;

/// Connect with a bounded pool.
pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Cheap liveness probe used at startup and by tests.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
