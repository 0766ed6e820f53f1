use thiserror::Error;

use crate::container::StoreKind;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} store is not available")]
    StoreUnavailable(StoreKind),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Failed to persist {operation}: {source}")]
    PersistenceWrite {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Setting missing or invalid: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Background(String),
}

impl Error {
    pub(crate) fn write(operation: &'static str, source: rusqlite::Error) -> Self {
        Error::PersistenceWrite { operation, source }
    }

    /// Recoverable misses the caller may choose to create or skip.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::RecordNotFound(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
