// Error handling framework
// One enum per concern; only startup errors ever leave the process boundary.

use thiserror::Error;

/// Errors produced while fetching the upstream queue status
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Invalid proxy configuration: {0}")]
    Proxy(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected status code: {0}")]
    UnexpectedStatus(u16),

    #[error("Failed to decode queue status payload: {0}")]
    Decode(String),
}

/// Notification delivery errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Notification request failed: {0}")]
    Request(String),

    #[error("Telegram sendMessage failed with status {0}")]
    UnexpectedStatus(u16),
}

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Snapshot persistence errors, scoped to a single observation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to serialize operations: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionFailed(err.to_string())
            }
            sqlx::Error::Database(db_err) => DatabaseError::QueryFailed(db_err.message().to_string()),
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    /// The request URL embeds the bot token and is dropped from the message
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Request(err.without_url().to_string())
    }
}
