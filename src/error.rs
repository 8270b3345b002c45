/// Error types for LiveView.
///
/// Every public operation checks validity and bounds locally and fails
/// synchronously with one of these variants. Nothing is retried.

use crate::column::ColumnType;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The table, view, or cursor is released or stale.
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Index {index} out of range [0, {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),
    #[error("Duplicate column '{0}' in schema")]
    DuplicateColumn(String),
    #[error("{operation} is not supported on {column_type:?} columns")]
    UnsupportedColumnType {
        operation: &'static str,
        column_type: ColumnType,
    },
    #[error("{0} is not implemented by the storage engine")]
    NotImplemented(&'static str),
    #[error("Type mismatch: expected {expected:?}, found {found}")]
    TypeMismatch { expected: ColumnType, found: String },
    #[error("Column '{0}' is not nullable")]
    NotNullable(String),
    #[error("Missing value for column '{0}'")]
    MissingValue(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification of an [`Error`], for callers that match on the
/// kind of failure rather than its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidState,
    IndexOutOfRange,
    ColumnNotFound,
    DuplicateColumn,
    UnsupportedColumnType,
    NotImplemented,
    TypeMismatch,
    NotNullable,
    MissingValue,
    Config,
    Serialization,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            Error::ColumnNotFound(_) => ErrorKind::ColumnNotFound,
            Error::DuplicateColumn(_) => ErrorKind::DuplicateColumn,
            Error::UnsupportedColumnType { .. } => ErrorKind::UnsupportedColumnType,
            Error::NotImplemented(_) => ErrorKind::NotImplemented,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::NotNullable(_) => ErrorKind::NotNullable,
            Error::MissingValue(_) => ErrorKind::MissingValue,
            Error::Config(_) => ErrorKind::Config,
            Error::Serialization(_) => ErrorKind::Serialization,
        }
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Error::InvalidState(message.into())
    }

    pub(crate) fn out_of_range(index: usize, len: usize) -> Self {
        Error::IndexOutOfRange { index, len }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
