use thiserror::Error;

/// Error shared by every job executor and surfaced by the scheduler.
///
/// The scheduler only looks at the variant to decide what happens to a
/// failed job; the message is stored verbatim in `jobs.last_error`.
#[derive(Debug, Error)]
pub enum FornoError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Primary/foreign key or UNIQUE violation. Indicates a data-integrity
    /// bug, so the job is never retried automatically.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Lock timeout or busy database. Safe to retry on the next trigger.
    #[error("Transient store error: {0}")]
    TransientStore(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown task: {task}")]
    UnknownTask { task: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FornoError {
    /// Short error code recorded alongside failed runs.
    pub fn code(&self) -> &'static str {
        match self {
            FornoError::Config(_) => "CONFIG_ERROR",
            FornoError::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            FornoError::TransientStore(_) => "TRANSIENT_STORE_ERROR",
            FornoError::Database(_) => "DATABASE_ERROR",
            FornoError::InvalidAmount(_) => "INVALID_AMOUNT",
            FornoError::UnknownTask { .. } => "UNKNOWN_TASK",
            FornoError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True when re-running the same job later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FornoError::TransientStore(_))
    }
}

pub type Result<T> = std::result::Result<T, FornoError>;

impl From<rusqlite::Error> for FornoError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => {
                FornoError::ConstraintViolation(e.to_string())
            }
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                FornoError::TransientStore(e.to_string())
            }
            _ => FornoError::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_timeouts_are_transient() {
        assert!(FornoError::TransientStore("database is locked".into()).is_transient());
        assert!(!FornoError::ConstraintViolation("FOREIGN KEY".into()).is_transient());
        assert!(!FornoError::UnknownTask { task: "x".into() }.is_transient());
    }

    #[test]
    fn busy_sqlite_error_is_transient() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".into()),
        );
        assert!(FornoError::from(err).is_transient());
    }

    #[test]
    fn missing_row_is_plain_database_error() {
        let mapped = FornoError::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(mapped.code(), "DATABASE_ERROR");
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            FornoError::ConstraintViolation(String::new()).code(),
            "CONSTRAINT_VIOLATION"
        );
        assert_eq!(
            FornoError::TransientStore(String::new()).code(),
            "TRANSIENT_STORE_ERROR"
        );
    }
}
