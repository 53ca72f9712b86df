//! Self-join matrix profile over multi-dimensional series.
//!
//! The distance between subsequences `S_i` and `S_j` of length `w` is the
//! Euclidean norm, across dimensions, of the per-dimension z-normalized
//! Euclidean distance. A constant subsequence normalizes to the zero vector:
//! two constants are at distance 0, and a constant is at distance `sqrt(w)`
//! from any non-constant subsequence in that dimension.
//!
//! Pairs closer than `w` (the exclusion zone) are never compared. Profiles are
//! computed diagonal by diagonal with sliding dot products, which is
//! `O(n^2 * d)` instead of the naive `O(n^2 * w * d)`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::point::Timestamp;
use crate::series::SeriesStore;
use crate::vector::dot_f64_unchecked;

/// Relative standard deviation under which a subsequence counts as constant.
const CONSTANT_STD_RATIO: f64 = 1e-9;
/// Sliding dot products are recomputed from scratch this often along a
/// diagonal to bound floating point drift.
const DOT_REFRESH_INTERVAL: usize = 1024;
const PARALLEL_MIN_WORK: usize = 1 << 18;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixProfileEntry {
    pub start_timestamp: Timestamp,
    pub end_timestamp: Timestamp,
    pub score: f64,
    pub window_size: usize,
    /// Start of the closest subsequence outside the exclusion zone.
    pub neighbor_timestamp: Option<Timestamp>,
}

#[derive(Debug, Clone)]
pub struct MatrixProfile {
    window: usize,
    timestamps: Vec<Timestamp>,
    profile: Vec<f64>,
    neighbors: Vec<Option<usize>>,
}

impl MatrixProfile {
    /// Computes the profile of `store` for subsequences of length `window`.
    ///
    /// Fails with `InvalidWindow` when `window == 0` or `window >= n`, and with
    /// `InsufficientData` when `n < 2 * window`.
    pub fn compute(store: &SeriesStore, window: usize) -> Result<Self, EngineError> {
        let points = store.len();
        if window == 0 || window >= points {
            return Err(EngineError::InvalidWindow { window, points });
        }
        let required = window.saturating_mul(2);
        if points < required {
            return Err(EngineError::InsufficientData {
                required,
                available: points,
            });
        }

        let dimension = store.dimension();
        let mut timestamps = Vec::with_capacity(points);
        let mut columns = vec![Vec::with_capacity(points); dimension];
        for point in store.iter() {
            timestamps.push(point.timestamp);
            for (column, value) in columns.iter_mut().zip(point.values) {
                column.push(f64::from(*value));
            }
        }

        let windows: Vec<WindowStats> = columns
            .iter_mut()
            .map(|column| WindowStats::new(column, window))
            .collect();
        let (profile, neighbors) = self_join(&columns, &windows, window);

        Ok(Self {
            window,
            timestamps,
            profile,
            neighbors,
        })
    }

    /// Nearest-neighbor distance per subsequence start; `f64::INFINITY` where
    /// no subsequence lies outside the exclusion zone.
    pub fn profile(&self) -> &[f64] {
        &self.profile
    }

    /// Start index of each subsequence's nearest neighbor.
    pub fn neighbors(&self) -> &[Option<usize>] {
        &self.neighbors
    }

    /// The `k` subsequences with the largest profile values, no two starting
    /// within `window` of each other.
    pub fn anomalies(&self, k: usize) -> Vec<MatrixProfileEntry> {
        self.select(k, true)
    }

    /// The `k` subsequences with the smallest profile values, no two starting
    /// within `window` of each other.
    pub fn motifs(&self, k: usize) -> Vec<MatrixProfileEntry> {
        self.select(k, false)
    }

    fn select(&self, k: usize, largest: bool) -> Vec<MatrixProfileEntry> {
        let mut order: Vec<usize> = (0..self.profile.len())
            .filter(|index| self.profile[*index].is_finite())
            .collect();
        order.sort_by(|left, right| {
            let by_score = self.profile[*left].total_cmp(&self.profile[*right]);
            let by_score = if largest { by_score.reverse() } else { by_score };
            by_score.then_with(|| left.cmp(right))
        });

        let mut picked: Vec<usize> = Vec::with_capacity(k.min(order.len()));
        for start in order {
            if picked.len() >= k {
                break;
            }
            if picked
                .iter()
                .any(|existing| existing.abs_diff(start) < self.window)
            {
                continue;
            }
            picked.push(start);
        }

        picked
            .into_iter()
            .map(|start| MatrixProfileEntry {
                start_timestamp: self.timestamps[start],
                end_timestamp: self.timestamps[start + self.window - 1],
                score: self.profile[start],
                window_size: self.window,
                neighbor_timestamp: self.neighbors[start].map(|neighbor| self.timestamps[neighbor]),
            })
            .collect()
    }
}

/// Per-window mean and standard deviation of one centered column.
#[derive(Debug)]
struct WindowStats {
    means: Vec<f64>,
    stds: Vec<f64>,
    constant: Vec<bool>,
}

impl WindowStats {
    /// Centers `column` on its global mean (z-normalization is shift
    /// invariant, and centering shrinks cancellation in the dot products),
    /// then computes two-pass statistics for every window.
    fn new(column: &mut [f64], window: usize) -> Self {
        let scale = column.iter().fold(0.0f64, |acc, value| acc.max(value.abs()));
        let global_mean = column.iter().sum::<f64>() / column.len() as f64;
        for value in column.iter_mut() {
            *value -= global_mean;
        }

        let count = column.len() - window + 1;
        let mut means = Vec::with_capacity(count);
        let mut stds = Vec::with_capacity(count);
        let mut constant = Vec::with_capacity(count);
        let width = window as f64;
        for values in column.windows(window) {
            let mean = values.iter().sum::<f64>() / width;
            let variance = values
                .iter()
                .map(|value| {
                    let delta = value - mean;
                    delta * delta
                })
                .sum::<f64>()
                / width;
            let std = variance.sqrt();
            means.push(mean);
            stds.push(std);
            constant.push(std <= CONSTANT_STD_RATIO * scale);
        }

        Self {
            means,
            stds,
            constant,
        }
    }

    fn squared_distance(&self, window: usize, left: usize, right: usize, dot: f64) -> f64 {
        let width = window as f64;
        match (self.constant[left], self.constant[right]) {
            (true, true) => 0.0,
            (true, false) | (false, true) => width,
            (false, false) => {
                let correlation = (dot - width * self.means[left] * self.means[right])
                    / (width * self.stds[left] * self.stds[right]);
                (2.0 * width * (1.0 - correlation.clamp(-1.0, 1.0))).max(0.0)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct LocalProfile {
    distances: Vec<f64>,
    neighbors: Vec<Option<usize>>,
}

impl LocalProfile {
    fn new(len: usize) -> Self {
        Self {
            distances: vec![f64::INFINITY; len],
            neighbors: vec![None; len],
        }
    }

    fn offer(&mut self, index: usize, neighbor: usize, distance: f64) {
        let better = match self.neighbors[index] {
            None => true,
            Some(current) => {
                distance < self.distances[index]
                    || (distance == self.distances[index] && neighbor < current)
            }
        };
        if better {
            self.distances[index] = distance;
            self.neighbors[index] = Some(neighbor);
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (index, neighbor) in other.neighbors.into_iter().enumerate() {
            if let Some(neighbor) = neighbor {
                self.offer(index, neighbor, other.distances[index]);
            }
        }
        self
    }
}

fn self_join(
    columns: &[Vec<f64>],
    windows: &[WindowStats],
    window: usize,
) -> (Vec<f64>, Vec<Option<usize>>) {
    let count = columns[0].len() - window + 1;
    let diagonals = window..count;

    let local = if should_parallelize(count, columns.len()) {
        diagonals
            .into_par_iter()
            .fold(
                || LocalProfile::new(count),
                |mut local, offset| {
                    walk_diagonal(columns, windows, window, offset, &mut local);
                    local
                },
            )
            .reduce(|| LocalProfile::new(count), LocalProfile::merge)
    } else {
        let mut local = LocalProfile::new(count);
        for offset in diagonals {
            walk_diagonal(columns, windows, window, offset, &mut local);
        }
        local
    };

    (local.distances, local.neighbors)
}

fn should_parallelize(count: usize, dimension: usize) -> bool {
    count
        .saturating_mul(count)
        .saturating_mul(dimension.max(1))
        >= PARALLEL_MIN_WORK
}

/// Visits every pair `(i, i + offset)` and offers the distance to both ends.
fn walk_diagonal(
    columns: &[Vec<f64>],
    windows: &[WindowStats],
    window: usize,
    offset: usize,
    local: &mut LocalProfile,
) {
    let count = columns[0].len() - window + 1;
    let mut dots = vec![0.0f64; columns.len()];

    for left in 0..count - offset {
        let right = left + offset;
        let refresh = left % DOT_REFRESH_INTERVAL == 0;
        let mut squared = 0.0f64;

        for (dimension, column) in columns.iter().enumerate() {
            let dot = &mut dots[dimension];
            if refresh {
                *dot = dot_f64_unchecked(
                    &column[left..left + window],
                    &column[right..right + window],
                );
            } else {
                *dot += column[left + window - 1] * column[right + window - 1]
                    - column[left - 1] * column[right - 1];
            }
            squared += windows[dimension].squared_distance(window, left, right, *dot);
        }

        let distance = squared.sqrt();
        local.offer(left, right, distance);
        local.offer(right, left, distance);
    }
}

#[cfg(test)]
mod tests;
