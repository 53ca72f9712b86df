//! Snapshot persistence: a versioned JSON document holding every series,
//! written atomically, plus the auto-save and auto-reload policy around it.

use std::error::Error;
use std::fmt;

mod fsync;
mod manager;
mod snapshot;

pub use manager::{
    AutosaveTrigger, FileFingerprint, LoadSummary, PersistenceManager, PersistencePolicy,
    ReloadOutcome, SaveSummary,
};
pub(crate) use snapshot::{read_snapshot, write_snapshot};

#[derive(Debug)]
pub enum PersistenceError {
    Io(std::io::Error),
    Serde(serde_json::Error),
    InvalidData(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(error) => write!(f, "io error: {error}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::InvalidData(message) => write!(f, "invalid persistence data: {message}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(error) => Some(error),
            Self::Serde(error) => Some(error),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}
