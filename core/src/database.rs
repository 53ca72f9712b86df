//! The engine context: shard table, global state lock and mutation counter.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::EngineError;
use crate::matrix_profile::{MatrixProfile, MatrixProfileEntry};
use crate::persistence::{read_snapshot, write_snapshot, LoadSummary, PersistenceError, SaveSummary};
use crate::point::{now_nanos, DataPoint, Labels, Timestamp};
use crate::router::{route_name, ShardRouter};
use crate::series::{SeriesConfig, SeriesExport, SeriesStats, DEFAULT_BUFFER_CAPACITY};
use crate::similarity::{find_similar, SimilarityMatch};

const NANOS_PER_HOUR: u64 = 3_600_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub shard_count: usize,
    pub buffer_capacity: usize,
    pub max_dimension: usize,
    pub strict_finite: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shard_count: 64,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_dimension: 4096,
            strict_finite: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.shard_count == 0 {
            return Err(EngineError::invalid_argument("shard count must be > 0"));
        }
        if self.buffer_capacity == 0 {
            return Err(EngineError::invalid_argument("buffer capacity must be > 0"));
        }
        if self.max_dimension == 0 {
            return Err(EngineError::invalid_argument("max dimension must be > 0"));
        }
        Ok(())
    }
}

/// One point to insert. A missing timestamp means "now".
#[derive(Debug, Clone, PartialEq)]
pub struct PointInput {
    pub timestamp: Option<Timestamp>,
    pub values: Vec<f32>,
    pub labels: Labels,
}

impl PointInput {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            timestamp: None,
            values,
            labels: Labels::new(),
        }
    }

    pub fn at(timestamp: Timestamp, values: Vec<f32>) -> Self {
        Self {
            timestamp: Some(timestamp),
            values,
            labels: Labels::new(),
        }
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    fn into_point(self, now: Timestamp) -> DataPoint {
        DataPoint::with_labels(self.timestamp.unwrap_or(now), self.values, self.labels)
    }
}

/// Sharded multi-series engine.
///
/// Every command holds the global state lock shared and the owning shard lock
/// for its duration, so commands on different shards run in parallel. `load`
/// takes the state lock exclusively to replace all shards at once; `save`
/// holds it shared plus every shard read lock for a consistent snapshot.
#[derive(Debug)]
pub struct Database {
    config: EngineConfig,
    router: ShardRouter,
    state: RwLock<()>,
    mutations: AtomicU64,
}

impl Database {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            router: ShardRouter::new(config.shard_count)?,
            config,
            state: RwLock::new(()),
            mutations: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn router(&self) -> &ShardRouter {
        &self.router
    }

    /// Monotonic count of successful creates and inserted points.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::Acquire)
    }

    pub fn create_series(&self, name: &str, dimension: usize) -> Result<(), EngineError> {
        if dimension > self.config.max_dimension {
            return Err(EngineError::invalid_argument(format!(
                "dimension {dimension} exceeds maximum {}",
                self.config.max_dimension
            )));
        }
        let config = SeriesConfig::with_options(
            dimension,
            self.config.strict_finite,
            self.config.buffer_capacity,
        )?;

        let _state = self.shared_state()?;
        self.router.create(name, config)?;
        self.record_mutations(1);
        Ok(())
    }

    /// Inserts one point and returns its timestamp.
    pub fn insert(&self, name: &str, input: PointInput) -> Result<Timestamp, EngineError> {
        let point = input.into_point(now_nanos());
        let timestamp = point.timestamp;

        let _state = self.shared_state()?;
        let mut shard = self.router.write_for(name)?;
        shard.series_mut(name)?.insert(point)?;
        self.record_mutations(1);
        Ok(timestamp)
    }

    /// All-or-nothing batch insert; returns the number of points stored.
    pub fn insert_batch(&self, name: &str, inputs: Vec<PointInput>) -> Result<usize, EngineError> {
        let now = now_nanos();
        let points: Vec<DataPoint> = inputs
            .into_iter()
            .map(|input| input.into_point(now))
            .collect();

        let _state = self.shared_state()?;
        let mut shard = self.router.write_for(name)?;
        let inserted = shard.series_mut(name)?.insert_batch(points)?;
        self.record_mutations(inserted as u64);
        Ok(inserted)
    }

    /// Every point, or only those from the last `hours_back` hours.
    pub fn query(&self, name: &str, hours_back: Option<u64>) -> Result<Vec<DataPoint>, EngineError> {
        let start = match hours_back {
            Some(hours) => now_nanos().saturating_sub(hours.saturating_mul(NANOS_PER_HOUR)),
            None => 0,
        };
        self.collect_range(name, start, Timestamp::MAX)
    }

    /// Points with `start <= timestamp <= end`.
    pub fn query_range(
        &self,
        name: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<DataPoint>, EngineError> {
        if start > end {
            return Err(EngineError::invalid_argument(format!(
                "range start {start} is after end {end}"
            )));
        }
        self.collect_range(name, start, end)
    }

    pub fn stats(&self, name: &str) -> Result<SeriesStats, EngineError> {
        let _state = self.shared_state()?;
        let shard = self.router.read_for(name)?;
        Ok(shard.series(name)?.stats())
    }

    /// Every series name, sorted.
    pub fn list(&self) -> Result<Vec<String>, EngineError> {
        let _state = self.shared_state()?;
        let mut names = Vec::new();
        for index in 0..self.router.shard_count() {
            let shard = self.router.read(index)?;
            names.extend(shard.names().map(str::to_string));
        }
        names.sort_unstable();
        Ok(names)
    }

    pub fn export(&self, name: &str) -> Result<SeriesExport, EngineError> {
        let _state = self.shared_state()?;
        let shard = self.router.read_for(name)?;
        Ok(shard.series(name)?.export())
    }

    /// Commits every write buffer; returns the number of points moved.
    pub fn flush(&self) -> Result<usize, EngineError> {
        let _state = self.shared_state()?;
        let mut moved = 0;
        for index in 0..self.router.shard_count() {
            moved += self.router.write(index)?.flush();
        }
        Ok(moved)
    }

    pub fn find_similar(
        &self,
        name: &str,
        query: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SimilarityMatch>, EngineError> {
        let _state = self.shared_state()?;
        let shard = self.router.read_for(name)?;
        find_similar(shard.series(name)?, query, limit, threshold)
    }

    pub fn matrix_profile(&self, name: &str, window: usize) -> Result<MatrixProfile, EngineError> {
        let _state = self.shared_state()?;
        let shard = self.router.read_for(name)?;
        MatrixProfile::compute(shard.series(name)?, window)
    }

    pub fn anomalies(
        &self,
        name: &str,
        window: usize,
        k: usize,
    ) -> Result<Vec<MatrixProfileEntry>, EngineError> {
        Self::validate_k(k)?;
        Ok(self.matrix_profile(name, window)?.anomalies(k))
    }

    pub fn motifs(
        &self,
        name: &str,
        window: usize,
        k: usize,
    ) -> Result<Vec<MatrixProfileEntry>, EngineError> {
        Self::validate_k(k)?;
        Ok(self.matrix_profile(name, window)?.motifs(k))
    }

    /// Writes a consistent snapshot of every series to `path`.
    pub fn save(&self, path: &Path) -> Result<SaveSummary, EngineError> {
        let _state = self.shared_state()?;
        let shards = self.router.read_all()?;
        let summary = write_snapshot(path, shards.iter().flat_map(|shard| shard.iter()))?;
        Ok(summary)
    }

    /// Replaces all in-memory state with the snapshot at `path`. The file is
    /// fully parsed and validated first; on any error live state is untouched.
    pub fn load(&self, path: &Path) -> Result<LoadSummary, EngineError> {
        let stores = read_snapshot(path, &self.config)?;
        let mut staged = self.router.staging();
        let mut summary = LoadSummary {
            series: 0,
            points: 0,
        };
        for store in stores {
            summary.series += 1;
            summary.points += store.len();
            let index = route_name(store.name(), staged.len());
            staged[index].adopt_series(store).map_err(|error| {
                EngineError::from(PersistenceError::InvalidData(error.to_string()))
            })?;
        }

        let _state = self.exclusive_state()?;
        let mut guards = self.router.write_all()?;
        for (guard, shard) in guards.iter_mut().zip(staged) {
            **guard = shard;
        }
        Ok(summary)
    }

    fn collect_range(
        &self,
        name: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<DataPoint>, EngineError> {
        let _state = self.shared_state()?;
        let shard = self.router.read_for(name)?;
        Ok(shard
            .series(name)?
            .range(start, end)
            .map(|point| point.to_point())
            .collect())
    }

    fn validate_k(k: usize) -> Result<(), EngineError> {
        if k == 0 {
            return Err(EngineError::invalid_argument("k must be > 0"));
        }
        Ok(())
    }

    fn record_mutations(&self, count: u64) {
        self.mutations.fetch_add(count, Ordering::AcqRel);
    }

    fn shared_state(&self) -> Result<RwLockReadGuard<'_, ()>, EngineError> {
        self.state
            .read()
            .map_err(|_| EngineError::lock_poisoned("state"))
    }

    fn exclusive_state(&self) -> Result<RwLockWriteGuard<'_, ()>, EngineError> {
        self.state
            .write()
            .map_err(|_| EngineError::lock_poisoned("state"))
    }
}
