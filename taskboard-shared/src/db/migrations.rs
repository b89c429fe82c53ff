/// Embedded schema migrations
///
/// Migration files live in this crate's `migrations/` directory as ordered
/// `{version}_{name}.sql` files and are compiled into the binary, so the
/// server can bring a fresh database up to date on startup with no external
/// tooling.

use sqlx::postgres::PgPool;
use tracing::info;

/// Applies all pending migrations
///
/// Safe to call on every startup; already-applied migrations are skipped.
///
/// # Errors
///
/// Fails when a migration file cannot be applied or a previously applied
/// migration's checksum no longer matches.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database schema is up to date");
    Ok(())
}
