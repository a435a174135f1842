//! Database migration runner.

use sqlx::PgPool;
use tracing::info;

use storefront_core::error::{AppError, ErrorKind};

/// Apply pending migrations, including the change feed triggers.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Database migrations applied");
    Ok(())
}
