//! Brute-force cosine similarity ranking over the points of one series.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::point::{Labels, PointRef, Timestamp};
use crate::series::SeriesStore;
use crate::vector::PreparedCosineQuery;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub timestamp: Timestamp,
    pub similarity: f32,
    pub values: Vec<f32>,
    pub labels: Labels,
}

/// Returns up to `limit` points with `similarity >= threshold`, ordered by
/// descending similarity and then ascending timestamp.
///
/// Similarity is `dot(q, p) / (|q| |p|)`, defined as `0.0` when either norm is
/// exactly zero. Runs in `O(n * d)` with a heap bounded by `limit`.
pub fn find_similar(
    store: &SeriesStore,
    query: &[f32],
    limit: usize,
    threshold: f32,
) -> Result<Vec<SimilarityMatch>, EngineError> {
    validate_query(store, query, threshold)?;
    if limit == 0 || store.is_empty() {
        return Ok(Vec::new());
    }

    let prepared = PreparedCosineQuery::new(query);
    let mut heap = BinaryHeap::with_capacity(limit.min(store.len()));
    for (position, point) in store.iter().enumerate() {
        let similarity = prepared.cosine_or_zero(point.values);
        // NaN only reaches here from series created with strict_finite off.
        if similarity.is_nan() || similarity < threshold {
            continue;
        }
        push_candidate(
            &mut heap,
            limit,
            Candidate {
                position,
                similarity,
                point,
            },
        );
    }

    let mut ranked = heap.into_vec();
    ranked.sort();
    Ok(ranked
        .into_iter()
        .map(|candidate| SimilarityMatch {
            timestamp: candidate.point.timestamp,
            similarity: candidate.similarity,
            values: candidate.point.values.to_vec(),
            labels: candidate.point.labels.clone(),
        })
        .collect())
}

fn validate_query(store: &SeriesStore, query: &[f32], threshold: f32) -> Result<(), EngineError> {
    if query.len() != store.dimension() {
        return Err(EngineError::DimensionMismatch {
            expected: store.dimension(),
            got: query.len(),
        });
    }
    if let Some(index) = query.iter().position(|value| !value.is_finite()) {
        return Err(EngineError::invalid_argument(format!(
            "query contains non-finite value at index {index}"
        )));
    }
    if !threshold.is_finite() {
        return Err(EngineError::invalid_argument("threshold must be finite"));
    }
    Ok(())
}

fn push_candidate<'a>(heap: &mut BinaryHeap<Candidate<'a>>, keep: usize, candidate: Candidate<'a>) {
    if heap.len() < keep {
        heap.push(candidate);
        return;
    }

    let should_replace = heap.peek().is_some_and(|worst| candidate < *worst);
    if should_replace {
        let _ = heap.pop();
        heap.push(candidate);
    }
}

/// Orders better matches first: higher similarity, then earlier position.
/// The heap therefore keeps the worst retained match on top.
#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    position: usize,
    similarity: f32,
    point: PointRef<'a>,
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Candidate<'_> {}

impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .similarity
            .total_cmp(&self.similarity)
            .then_with(|| self.position.cmp(&other.position))
    }
}
