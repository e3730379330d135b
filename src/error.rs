use thiserror::Error;
use uuid::Uuid;

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Errors raised by the data access layer
#[derive(Debug, Error)]
pub enum DataError {
    /// A direct lookup by identifier found nothing
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Malformed or unsupported parameter, rejected before any query runs
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unique or constraint violation reported by the store
    #[error("Conflict: {0}")]
    Conflict(String),

    /// More than one curtailment is active for the same site and instant
    #[error("Ambiguous curtailment for site {site_uuid} at {at}: {count} windows active")]
    Ambiguous {
        site_uuid: Uuid,
        at: chrono::DateTime<chrono::Utc>,
        count: usize,
    },

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

pub type DataResult<T> = Result<T, DataError>;

impl DataError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<sqlx::Error> for DataError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                DataError::Conflict(db_err.message().to_string())
            }
            _ => DataError::Database(error),
        }
    }
}

impl From<validator::ValidationErrors> for DataError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DataError::InvalidArgument(errors.to_string())
    }
}
