//! Connection pool setup and migration runner.

use crate::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connect to Postgres and run pending migrations. Called once at boot.
pub async fn connect_and_migrate(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}
