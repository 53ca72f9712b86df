#![forbid(unsafe_code)]
//! Core engine for Vectis.
//!
//! Sharded storage of timestamped fixed-dimension vectors, brute-force cosine
//! similarity search, matrix profile anomaly/motif discovery and snapshot
//! persistence. The crate performs no I/O other than reading and writing
//! snapshot files; transports live in the server crate.

pub mod database;
pub mod error;
pub mod matrix_profile;
pub mod persistence;
pub mod point;
pub mod router;
pub mod series;
pub mod shard;
pub mod similarity;
pub mod vector;

pub use database::{Database, EngineConfig, PointInput};
pub use error::EngineError;
pub use matrix_profile::{MatrixProfile, MatrixProfileEntry};
pub use persistence::{
    AutosaveTrigger, FileFingerprint, LoadSummary, PersistenceError, PersistenceManager,
    PersistencePolicy, ReloadOutcome, SaveSummary,
};
pub use point::{now_nanos, DataPoint, Labels, PointRef, Timestamp};
pub use router::ShardRouter;
pub use series::{SeriesConfig, SeriesExport, SeriesStats, SeriesStore, DEFAULT_BUFFER_CAPACITY};
pub use shard::Shard;
pub use similarity::{find_similar, SimilarityMatch};
pub use vector::PreparedCosineQuery;
