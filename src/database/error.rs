//! Database error types.

use thiserror::Error;

/// Errors raised while describing, opening or using a database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid database uri: {0}")]
    InvalidUri(String),
    #[error("unsupported database driver: {0}")]
    UnsupportedDriver(String),
    #[error("failed to create database engine: {source}")]
    Engine {
        #[source]
        source: sqlx::Error,
    },
    #[error("database error: {0}")]
    Query(#[from] sqlx::Error),
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
