//! CLI subcommand implementations.

pub mod codes;
pub mod distance;
pub mod migrate;
pub mod route;

use secrecy::SecretString;
use thiserror::Error;

/// Errors shared by commands that need the database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read the passport database URL, falling back to `DATABASE_URL`.
///
/// # Errors
///
/// Returns `DatabaseError::MissingEnvVar` if neither variable is set.
pub fn database_url() -> Result<SecretString, DatabaseError> {
    dotenvy::dotenv().ok();

    std::env::var("PASSPORT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| DatabaseError::MissingEnvVar("PASSPORT_DATABASE_URL"))
}
