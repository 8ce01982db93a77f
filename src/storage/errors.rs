//! Errors raised by exclusion stores.
//!
//! These describe the persistence layer only. They carry no knowledge of
//! Graph, tokens or authorization.

use std::fmt;

/// Errors that can occur during exclusion store operations.
#[derive(Debug)]
pub enum StorageError {
    /// A record that cannot be stored.
    InvalidRecord {
        field: &'static str,
        message: String,
    },

    /// The backend could not be opened or created.
    Open { location: String, message: String },

    /// The backend is locked by another writer; the call may be retried.
    Busy { operation: &'static str },

    /// Any other backend failure.
    Backend {
        operation: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::InvalidRecord { field, message } => {
                write!(f, "Invalid exclusion record: {} {}", field, message)
            }
            StorageError::Open { location, message } => {
                write!(f, "Cannot open exclusion store at {}: {}", location, message)
            }
            StorageError::Busy { operation } => {
                write!(f, "Exclusion store busy during {}", operation)
            }
            StorageError::Backend { operation, source } => {
                write!(f, "Exclusion store failed to {}: {}", operation, source)
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Backend { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl StorageError {
    pub fn invalid_record(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            field,
            message: message.into(),
        }
    }

    pub fn open(location: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Open {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn busy(operation: &'static str) -> Self {
        Self::Busy { operation }
    }

    pub fn backend(
        operation: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            operation,
            source: Box::new(source),
        }
    }

    /// Whether retrying the same call might succeed.
    pub fn is_temporary(&self) -> bool {
        matches!(self, StorageError::Busy { .. })
    }

    /// Whether the caller supplied a record that can never be stored.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, StorageError::InvalidRecord { .. })
    }
}
