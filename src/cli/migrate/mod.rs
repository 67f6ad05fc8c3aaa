//! Migrate command - applies the schema to PostgreSQL

use tracing::info;

use crate::infrastructure::storage::{connect_pool, run_migrations};

use super::bootstrap;

pub async fn run() -> anyhow::Result<()> {
    let config = bootstrap()?;

    let pool = connect_pool(&config.database.postgres_config()).await?;
    let applied = run_migrations(&pool).await?;

    info!(applied, "Migrations complete");
    Ok(())
}
