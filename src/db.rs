use anyhow::Context;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Opens the connection pool used by the whole application
pub async fn connect_sqlx(db_url: &str, max_connections: u32) -> Result<PgPool, anyhow::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(db_url)
        .await
        .context("connecting to the database")
}

/// Brings the schema up to date with the migrations bundled into the binary
pub async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("running database migrations")
}
