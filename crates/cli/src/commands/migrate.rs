//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! tp-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `PASSPORT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! Migrations live in `crates/server/migrations/` and are embedded at build time.

use thiserror::Error;

use tourpass_server::db;

use super::{DatabaseError, database_url};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connection(#[from] DatabaseError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply all pending passport migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to passport database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running passport migrations...");
    db::MIGRATOR.run(&pool).await?;

    tracing::info!("Passport migrations complete!");
    Ok(())
}
