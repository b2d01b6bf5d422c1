//! Error types for the storage layer.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage error types.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// SQLite/sqlx error
    #[error("Database error: {0}")]
    #[diagnostic(code(liveupdate_store::sqlx))]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    #[diagnostic(code(liveupdate_store::migration))]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Payload serialization error
    #[error("Serialization error: {0}")]
    #[diagnostic(
        code(liveupdate_store::serialization),
        help("Stored payloads must be valid JSON")
    )]
    Serialization(#[from] serde_json::Error),

    /// IO error (for filesystem operations)
    #[error("IO error: {0}")]
    #[diagnostic(code(liveupdate_store::io))]
    Io(#[from] std::io::Error),
}
