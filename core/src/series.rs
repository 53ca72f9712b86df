use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::point::{validate_labels, validate_values, DataPoint, Labels, PointRef, Timestamp};

pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesConfig {
    pub dimension: usize,
    pub strict_finite: bool,
    pub buffer_capacity: usize,
}

impl SeriesConfig {
    pub fn new(dimension: usize) -> Result<Self, EngineError> {
        Self::with_options(dimension, true, DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_options(
        dimension: usize,
        strict_finite: bool,
        buffer_capacity: usize,
    ) -> Result<Self, EngineError> {
        if dimension == 0 {
            return Err(EngineError::invalid_argument("dimension must be > 0"));
        }
        if buffer_capacity == 0 {
            return Err(EngineError::invalid_argument("buffer capacity must be > 0"));
        }

        Ok(Self {
            dimension,
            strict_finite,
            buffer_capacity,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub name: String,
    pub dimension: usize,
    pub memory_points: usize,
    pub buffered_points: usize,
    pub total_points: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesExport {
    pub name: String,
    pub dimension: usize,
    pub total_points: u64,
    pub points: Vec<DataPoint>,
}

/// Committed points laid out column by column; `values` is row-major with
/// `dimension` floats per row.
#[derive(Debug, Clone, Default)]
struct CommittedColumns {
    timestamps: Vec<Timestamp>,
    values: Vec<f32>,
    labels: Vec<Labels>,
}

impl CommittedColumns {
    fn with_capacity(rows: usize, dimension: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(rows),
            values: Vec::with_capacity(rows.saturating_mul(dimension)),
            labels: Vec::with_capacity(rows),
        }
    }

    fn len(&self) -> usize {
        self.timestamps.len()
    }

    fn last_timestamp(&self) -> Option<Timestamp> {
        self.timestamps.last().copied()
    }

    fn row(&self, index: usize, dimension: usize) -> PointRef<'_> {
        let offset = index * dimension;
        PointRef {
            timestamp: self.timestamps[index],
            values: &self.values[offset..offset + dimension],
            labels: &self.labels[index],
        }
    }

    fn push(&mut self, point: DataPoint) {
        self.timestamps.push(point.timestamp);
        self.values.extend_from_slice(&point.values);
        self.labels.push(point.labels);
    }

    fn lower_bound(&self, timestamp: Timestamp) -> usize {
        self.timestamps.partition_point(|value| *value < timestamp)
    }

    fn upper_bound(&self, timestamp: Timestamp) -> usize {
        self.timestamps.partition_point(|value| *value <= timestamp)
    }
}

/// Ordered point history of one series: a sorted write buffer in front of a
/// sorted columnar committed store. Reads always see the union of both.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    name: String,
    config: SeriesConfig,
    buffer: Vec<DataPoint>,
    committed: CommittedColumns,
    total_points: u64,
}

impl SeriesStore {
    pub fn new(name: impl Into<String>, config: SeriesConfig) -> Result<Self, EngineError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EngineError::invalid_argument(
                "series name must not be empty",
            ));
        }

        Ok(Self {
            name,
            config,
            buffer: Vec::new(),
            committed: CommittedColumns::default(),
            total_points: 0,
        })
    }

    /// Rebuilds a series from persisted points. Points are validated and
    /// stably sorted by timestamp, then stored as committed.
    pub fn restore(
        name: impl Into<String>,
        config: SeriesConfig,
        mut points: Vec<DataPoint>,
        total_points: u64,
    ) -> Result<Self, EngineError> {
        let mut store = Self::new(name, config)?;
        for point in &points {
            store.validate_point(point)?;
        }

        points.sort_by_key(|point| point.timestamp);
        let mut committed = CommittedColumns::with_capacity(points.len(), config.dimension);
        for point in points {
            committed.push(point);
        }
        store.total_points = total_points.max(committed.len() as u64);
        store.committed = committed;
        Ok(store)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn config(&self) -> SeriesConfig {
        self.config
    }

    /// Points held in memory, buffered and committed.
    pub fn len(&self) -> usize {
        self.buffer.len() + self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn total_points(&self) -> u64 {
        self.total_points
    }

    pub fn insert(&mut self, point: DataPoint) -> Result<(), EngineError> {
        self.validate_point(&point)?;
        self.insert_validated(point);
        Ok(())
    }

    /// Inserts every point or none of them.
    pub fn insert_batch(&mut self, points: Vec<DataPoint>) -> Result<usize, EngineError> {
        for point in &points {
            self.validate_point(point)?;
        }
        let inserted = points.len();
        for point in points {
            self.insert_validated(point);
        }
        Ok(inserted)
    }

    /// Merges the write buffer into the committed store and returns how many
    /// points moved. A no-op on an empty buffer.
    pub fn flush(&mut self) -> usize {
        if self.buffer.is_empty() {
            return 0;
        }

        let buffered = std::mem::take(&mut self.buffer);
        let moved = buffered.len();
        let appends_in_order = match (self.committed.last_timestamp(), buffered.first()) {
            (Some(last), Some(first)) => first.timestamp >= last,
            _ => true,
        };

        if appends_in_order {
            for point in buffered {
                self.committed.push(point);
            }
            return moved;
        }

        let dimension = self.config.dimension;
        let CommittedColumns {
            timestamps,
            values,
            labels,
        } = std::mem::take(&mut self.committed);
        let mut merged = CommittedColumns::with_capacity(timestamps.len() + moved, dimension);
        let mut pending = buffered.into_iter().peekable();

        for ((timestamp, row_values), row_labels) in timestamps
            .into_iter()
            .zip(values.chunks_exact(dimension))
            .zip(labels)
        {
            while let Some(point) = pending.next_if(|point| point.timestamp < timestamp) {
                merged.push(point);
            }
            merged.timestamps.push(timestamp);
            merged.values.extend_from_slice(row_values);
            merged.labels.push(row_labels);
        }
        for point in pending {
            merged.push(point);
        }

        self.committed = merged;
        moved
    }

    /// All points in ascending timestamp order.
    pub fn iter(&self) -> SeriesIter<'_> {
        SeriesIter {
            committed: &self.committed,
            dimension: self.config.dimension,
            committed_pos: 0,
            committed_end: self.committed.len(),
            buffered: &self.buffer,
        }
    }

    /// Points with `start <= timestamp <= end`, ascending.
    pub fn range(&self, start: Timestamp, end: Timestamp) -> SeriesIter<'_> {
        if start > end {
            return SeriesIter {
                committed: &self.committed,
                dimension: self.config.dimension,
                committed_pos: 0,
                committed_end: 0,
                buffered: &[],
            };
        }

        let buffer_start = self.buffer.partition_point(|point| point.timestamp < start);
        let buffer_end = self.buffer.partition_point(|point| point.timestamp <= end);
        SeriesIter {
            committed: &self.committed,
            dimension: self.config.dimension,
            committed_pos: self.committed.lower_bound(start),
            committed_end: self.committed.upper_bound(end),
            buffered: &self.buffer[buffer_start..buffer_end],
        }
    }

    pub fn stats(&self) -> SeriesStats {
        SeriesStats {
            name: self.name.clone(),
            dimension: self.config.dimension,
            memory_points: self.len(),
            buffered_points: self.buffer.len(),
            total_points: self.total_points,
        }
    }

    pub fn export(&self) -> SeriesExport {
        SeriesExport {
            name: self.name.clone(),
            dimension: self.config.dimension,
            total_points: self.total_points,
            points: self.iter().map(|point| point.to_point()).collect(),
        }
    }

    fn validate_point(&self, point: &DataPoint) -> Result<(), EngineError> {
        validate_values(
            &point.values,
            self.config.dimension,
            self.config.strict_finite,
        )?;
        validate_labels(&point.labels)
    }

    fn insert_validated(&mut self, point: DataPoint) {
        let position = self
            .buffer
            .partition_point(|existing| existing.timestamp <= point.timestamp);
        self.buffer.insert(position, point);
        self.total_points = self.total_points.saturating_add(1);

        if self.buffer.len() >= self.config.buffer_capacity {
            let _ = self.flush();
        }
    }
}

/// Merging iterator over the committed store and the write buffer. On equal
/// timestamps committed points come first, preserving insertion order.
#[derive(Debug, Clone)]
pub struct SeriesIter<'a> {
    committed: &'a CommittedColumns,
    dimension: usize,
    committed_pos: usize,
    committed_end: usize,
    buffered: &'a [DataPoint],
}

impl<'a> Iterator for SeriesIter<'a> {
    type Item = PointRef<'a>;

    fn next(&mut self) -> Option<PointRef<'a>> {
        let committed = self.committed;
        let buffered = self.buffered;
        let has_committed = self.committed_pos < self.committed_end;

        let take_committed = match (has_committed, buffered.first()) {
            (false, None) => return None,
            (true, None) => true,
            (false, Some(_)) => false,
            (true, Some(point)) => committed.timestamps[self.committed_pos] <= point.timestamp,
        };

        if take_committed {
            let row = committed.row(self.committed_pos, self.dimension);
            self.committed_pos += 1;
            return Some(row);
        }

        let (first, rest) = buffered.split_first()?;
        self.buffered = rest;
        Some(first.view())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.committed_end.saturating_sub(self.committed_pos) + self.buffered.len();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SeriesIter<'_> {}
