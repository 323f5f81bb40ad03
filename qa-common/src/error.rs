//! Common error types for QA automation

use thiserror::Error;

/// Common result type for QA automation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the QA tooling and service
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found (sheet, workbook, property)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Sheet Store operation rejected (bad row/column, malformed manifest)
    #[error("Sheet error: {0}")]
    Sheet(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
