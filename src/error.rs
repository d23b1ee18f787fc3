//! Error types for gator.

use thiserror::Error;

use crate::rss::CyclePhase;

/// Common error type for gator.
#[derive(Error, Debug)]
pub enum GatorError {
    /// Database error.
    ///
    /// Wraps any persistence failure other than a uniqueness conflict.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// A row with the same unique key already exists.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Feed fetch error.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A fatal error raised while the scheduler was in the given phase.
    #[error("{phase} failed for feed {feed}: {source}")]
    Cycle {
        feed: String,
        phase: CyclePhase,
        #[source]
        source: Box<GatorError>,
    },
}

impl GatorError {
    /// Returns true for uniqueness conflicts.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, GatorError::DuplicateKey(_))
    }
}

impl From<sqlx::Error> for GatorError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return GatorError::DuplicateKey(db_err.message().to_string());
            }
        }
        GatorError::Database(e.to_string())
    }
}

/// Errors raised while fetching or decoding a feed document.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("failed to create HTTP client: {0}")]
    Client(String),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),

    #[error("feed too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("failed to read response: {0}")]
    Body(#[source] reqwest::Error),

    #[error("failed to decode RSS document: {0}")]
    Decode(String),
}

/// A publication date that matched none of the supported formats.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized date format: '{raw}'")]
pub struct DateParseError {
    pub raw: String,
}

/// Result type alias for gator operations.
pub type Result<T> = std::result::Result<T, GatorError>;
