//! Database migration runner.

use sqlx::migrate::Migrator;
use tracing::info;

use keygate_core::error::{AppError, ErrorKind};

use crate::connection::DatabasePool;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Apply every pending migration under `migrations/`.
pub async fn run_migrations(db: &DatabasePool) -> Result<(), AppError> {
    info!(known = MIGRATOR.migrations.len(), "Running database migrations");

    MIGRATOR.run(db.pool()).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to run migrations: {e}"),
            e,
        )
    })?;

    info!("Database migrations completed");
    Ok(())
}
