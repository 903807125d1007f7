//! Quota Error Types
//!
//! Store faults are absorbed by the layers (fail open) and only ever reach
//! logs. Conversion into `kernel::error::AppError` exists for the places
//! that do surface an error, such as startup.

use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Quota-specific result type alias
pub type QuotaResult<T> = Result<T, QuotaError>;

/// Quota-specific error variants
#[derive(Debug, Error)]
pub enum QuotaError {
    /// Durable store fault
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Cache store fault
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// Stored data violates an invariant
    #[error("Corrupt bucket row: {0}")]
    CorruptRow(String),
}

impl QuotaError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuotaError::Database(
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_),
            ) => ErrorKind::ServiceUnavailable,
            QuotaError::Database(_) => ErrorKind::InternalServerError,
            QuotaError::Cache(e) if e.is_timeout() => ErrorKind::RequestTimeout,
            QuotaError::Cache(e)
                if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() =>
            {
                ErrorKind::ServiceUnavailable
            }
            QuotaError::Cache(_) | QuotaError::CorruptRow(_) => ErrorKind::InternalServerError,
        }
    }

    /// Outage rather than a bug
    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }

    /// Store that produced the fault, for log fields
    pub fn store(&self) -> &'static str {
        match self {
            QuotaError::Database(_) | QuotaError::CorruptRow(_) => "postgres",
            QuotaError::Cache(_) => "redis",
        }
    }
}

impl From<QuotaError> for AppError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::Database(e) => AppError::from(e),
            QuotaError::Cache(e) => AppError::from(e),
            QuotaError::CorruptRow(msg) => AppError::internal(format!("Corrupt bucket row: {msg}")),
        }
    }
}
