use forno_core::FornoError;
use thiserror::Error;

/// Errors raised by the sales/inventory store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A money value cannot be represented as whole hundredths.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A stored date or timestamp does not parse.
    #[error("malformed value in column {column}: {value}")]
    Malformed { column: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for FornoError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(db) => db.into(),
            StoreError::InvalidAmount(msg) => FornoError::InvalidAmount(msg),
            StoreError::Malformed { .. } => FornoError::Database(e.to_string()),
        }
    }
}
