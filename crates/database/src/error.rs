use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load environment variables for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Database error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("An error occurred during JSON serialization/deserialization: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("File store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored row could not be decoded: {0}")]
    InvalidRow(String),

    #[error("Every configured store failed: {0}")]
    Unavailable(String),
}
