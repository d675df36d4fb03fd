//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Settings loading error.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("validation failed for field `{field}`: {message}")]
    Validation { field: String, message: String },
}

impl SettingsError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
