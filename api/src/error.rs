//! Load-time error types

use std::path::PathBuf;

use thiserror::Error;

/// Result type for dataset loading
pub type Result<T> = std::result::Result<T, MalformedInputError>;

/// Errors that make the viewing-event source unusable.
///
/// All of these are fatal at load time; there is no partial load.
#[derive(Debug, Error)]
pub enum MalformedInputError {
    /// Source file missing or unreadable
    #[error("failed to read dataset '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source is not a JSON array of records, or a field has the wrong JSON type
    #[error("dataset is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is absent from a record
    #[error("record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    /// A calendar date does not match `YYYY-MM-DD`
    #[error("record {index} has invalid date in '{field}': '{value}'")]
    InvalidDate {
        index: usize,
        field: &'static str,
        value: String,
    },

    /// A timestamp does not match `YYYY-MM-DDTHH:MM:SS`
    #[error("record {index} has invalid timestamp in '{field}': '{value}'")]
    InvalidTimestamp {
        index: usize,
        field: &'static str,
        value: String,
    },
}

impl MalformedInputError {
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    #[inline]
    pub fn missing_field(index: usize, field: &'static str) -> Self {
        Self::MissingField { index, field }
    }

    #[inline]
    pub fn invalid_date(index: usize, field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidDate {
            index,
            field,
            value: value.into(),
        }
    }

    #[inline]
    pub fn invalid_timestamp(index: usize, field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            index,
            field,
            value: value.into(),
        }
    }
}
