use forno_core::FornoError;
use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The provided trigger definition is invalid.
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    /// No job with the given name exists in the store.
    #[error("Job not found: {name}")]
    JobNotFound { name: String },

    /// A job with this name is already registered.
    #[error("Job already exists: {name}")]
    DuplicateJob { name: String },

    /// A manual run named a task nobody registered.
    #[error("Unknown task: {task}")]
    UnknownTask { task: String },

    /// The task itself failed; its transaction was rolled back.
    #[error("Task failed: {0}")]
    Task(#[from] FornoError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

impl From<SchedulerError> for FornoError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::Database(db) => db.into(),
            SchedulerError::Task(inner) => inner,
            SchedulerError::UnknownTask { task } => FornoError::UnknownTask { task },
            other => FornoError::Internal(other.to_string()),
        }
    }
}
