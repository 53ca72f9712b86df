use std::error::Error;
use std::fmt;

use crate::persistence::PersistenceError;

/// Failure kinds reported by every engine operation.
#[derive(Debug)]
pub enum EngineError {
    SeriesNotFound { name: String },
    AlreadyExists { name: String },
    DimensionMismatch { expected: usize, got: usize },
    InvalidWindow { window: usize, points: usize },
    InsufficientData { required: usize, available: usize },
    Persistence(PersistenceError),
    InvalidArgument(String),
    /// A lock was poisoned by a panicking holder.
    Internal(String),
}

impl EngineError {
    pub(crate) fn series_not_found(name: &str) -> Self {
        Self::SeriesNotFound {
            name: name.to_string(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn lock_poisoned(what: &str) -> Self {
        Self::Internal(format!("{what} lock poisoned"))
    }

    /// Stable kind name used by transports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SeriesNotFound { .. } => "SeriesNotFound",
            Self::AlreadyExists { .. } => "AlreadyExists",
            Self::DimensionMismatch { .. } => "DimensionMismatch",
            Self::InvalidWindow { .. } => "InvalidWindow",
            Self::InsufficientData { .. } => "InsufficientData",
            Self::Persistence(_) => "PersistenceError",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::Internal(_) => "Internal",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SeriesNotFound { name } => write!(f, "series '{name}' not found"),
            Self::AlreadyExists { name } => write!(f, "series '{name}' already exists"),
            Self::DimensionMismatch { expected, got } => {
                write!(f, "dimension mismatch: expected {expected}, got {got}")
            }
            Self::InvalidWindow { window, points } => {
                write!(
                    f,
                    "invalid window {window}: must be > 0 and < point count {points}"
                )
            }
            Self::InsufficientData {
                required,
                available,
            } => write!(
                f,
                "insufficient data: need at least {required} points, series has {available}"
            ),
            Self::Persistence(error) => write!(f, "persistence error: {error}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::Internal(message) => write!(f, "internal error: {message}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(error) => Some(error),
            _ => None,
        }
    }
}

impl From<PersistenceError> for EngineError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}
