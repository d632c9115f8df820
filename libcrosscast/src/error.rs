//! Error types for Crosscast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrosscastError>;

#[derive(Error, Debug)]
pub enum CrosscastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CrosscastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CrosscastError::InvalidInput(_) => 3,
            CrosscastError::Queue(_) => 3,
            CrosscastError::Platform(PlatformError::Authentication(_)) => 2,
            CrosscastError::Platform(_) => 1,
            CrosscastError::Config(_) => 1,
            CrosscastError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to decode stored record: {0}")]
    DecodeError(#[from] serde_json::Error),

    #[error("Unknown status value in stored record: {0}")]
    UnknownStatus(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// State errors raised by the queue store. These are caller mistakes
/// (wrong id, wrong lifecycle state) and are never swallowed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Item {id} is not {expected} (status: {actual})")]
    InvalidState {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("Platform set cannot be empty")]
    EmptyPlatforms,
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Circuit breaker open for {0}")]
    CircuitOpen(String),
}

impl PlatformError {
    /// Classify a failure as retryable (transient) or permanent.
    ///
    /// Retryable: connection resets, timeouts, DNS failures, throttling,
    /// and HTTP 408/429/5xx. Everything else (auth, validation, other 4xx,
    /// open breaker) propagates immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlatformError::Network(_)
            | PlatformError::Timeout(_)
            | PlatformError::RateLimited(_) => true,
            PlatformError::Http { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            PlatformError::Authentication(_)
            | PlatformError::Validation(_)
            | PlatformError::Posting(_)
            | PlatformError::CircuitOpen(_) => false,
        }
    }
}
