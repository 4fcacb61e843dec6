//! Error types for the lead import pipeline

use thiserror::Error;

/// Whole-run failures of a lead import.
///
/// Row-local problems never surface here; they are counted in the
/// [`ImportResult`](crate::types::ImportResult) instead.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Input rejected before anything was persisted.
    #[error("{0}")]
    Validation(String),

    /// Spreadsheet container or XML part could not be read.
    #[error("unreadable workbook: {0}")]
    Workbook(String),

    /// Raw upload could not be written to or read from the blob store.
    #[error("upload storage failed: {0}")]
    Storage(#[from] std::io::Error),

    /// Persistence transaction failed; nothing from the run was kept.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Collaborator lookups (user directory, existing contacts) failed.
    #[error("{0}")]
    Collaborator(#[from] anyhow::Error),
}

impl ImportError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Error code used in NATS error responses
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::Validation(_) | ImportError::Workbook(_) => "VALIDATION_ERROR",
            ImportError::Storage(_) => "IMPORT_FAILED",
            ImportError::Database(_) | ImportError::Collaborator(_) => "DATABASE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_validation_code() {
        let err = ImportError::validation("No data found in file");
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.to_string(), "No data found in file");
    }

    #[test]
    fn test_database_error_code() {
        let err = ImportError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_storage_error_code() {
        let err = ImportError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert_eq!(err.code(), "IMPORT_FAILED");
        assert!(err.to_string().contains("disk full"));
    }
}
