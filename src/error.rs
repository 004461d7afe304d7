use rusqlite::Error as RusqliteError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PagePulseError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] RusqliteError), // Converts rusqlite::Error automatically

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("HTTP {status}: {status_text}")]
    HttpStatus { status: u16, status_text: String },

    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("Check already in progress for url {0}")]
    CheckInProgress(i64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Error: {0}")]
    Error(String), // Allows custom application errors
}
