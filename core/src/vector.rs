//! SIMD kernels shared by similarity search and the matrix profile.
//!
//! Products and squared norms accumulate in `f64`. Squaring an `f32` near
//! its range limits overflows or underflows in `f32`, which would break
//! `cos(v, v) = 1` for very large or very small non-zero vectors.

use wide::f64x4;

const SIMD_WIDTH: usize = 4;

/// Pre-packed query for repeated cosine computations against the points of
/// one series.
#[derive(Debug, Clone)]
pub struct PreparedCosineQuery {
    len: usize,
    simd_query: Vec<f64x4>,
    tail: [f64; SIMD_WIDTH],
    tail_len: usize,
    query_norm: f64,
}

impl PreparedCosineQuery {
    pub fn new(query: &[f32]) -> Self {
        let widened: Vec<f64> = query.iter().copied().map(f64::from).collect();
        let mut chunks = widened.chunks_exact(SIMD_WIDTH);
        let simd_query = chunks.by_ref().map(load_f64x4).collect();
        let remainder = chunks.remainder();

        let mut tail = [0.0f64; SIMD_WIDTH];
        tail[..remainder.len()].copy_from_slice(remainder);
        Self {
            len: query.len(),
            simd_query,
            tail,
            tail_len: remainder.len(),
            query_norm: dot_f64_unchecked(&widened, &widened).sqrt(),
        }
    }

    /// Cosine similarity against a same-length vector, clamped to `[-1, 1]`.
    /// `0.0` when either vector is all zeros; NaN only for non-finite input.
    pub fn cosine_or_zero(&self, right: &[f32]) -> f32 {
        let (dot, right_sq_sum) = self.dot_and_right_sq_sum(right);
        if self.query_norm == 0.0 || right_sq_sum == 0.0 {
            return 0.0;
        }
        let cosine = dot / (self.query_norm * right_sq_sum.sqrt());
        cosine.clamp(-1.0, 1.0) as f32
    }

    fn dot_and_right_sq_sum(&self, right: &[f32]) -> (f64, f64) {
        debug_assert_eq!(right.len(), self.len);
        let simd_prefix_len = self.simd_query.len() * SIMD_WIDTH;

        let mut dot_sum = f64x4::ZERO;
        let mut right_sq_sum = f64x4::ZERO;
        for (query_v, right_chunk) in self
            .simd_query
            .iter()
            .zip(right[..simd_prefix_len].chunks_exact(SIMD_WIDTH))
        {
            let right_v = widen_f32x4(right_chunk);
            dot_sum += *query_v * right_v;
            right_sq_sum += right_v * right_v;
        }

        let mut dot_scalar = 0.0f64;
        let mut right_sq_scalar = 0.0f64;
        for (query_value, right_value) in self.tail[..self.tail_len]
            .iter()
            .zip(&right[simd_prefix_len..])
        {
            let right_value = f64::from(*right_value);
            dot_scalar += query_value * right_value;
            right_sq_scalar += right_value * right_value;
        }

        (
            dot_sum.reduce_add() + dot_scalar,
            right_sq_sum.reduce_add() + right_sq_scalar,
        )
    }
}

/// Dot product of two same-length `f64` slices.
pub fn dot_f64_unchecked(left: &[f64], right: &[f64]) -> f64 {
    debug_assert_eq!(left.len(), right.len());
    let mut left_chunks = left.chunks_exact(SIMD_WIDTH);
    let mut right_chunks = right.chunks_exact(SIMD_WIDTH);

    let mut simd_sum = f64x4::ZERO;
    for (left_chunk, right_chunk) in left_chunks.by_ref().zip(right_chunks.by_ref()) {
        simd_sum += load_f64x4(left_chunk) * load_f64x4(right_chunk);
    }

    let scalar_sum: f64 = left_chunks
        .remainder()
        .iter()
        .zip(right_chunks.remainder())
        .map(|(left_value, right_value)| left_value * right_value)
        .sum();
    simd_sum.reduce_add() + scalar_sum
}

fn load_f64x4(values: &[f64]) -> f64x4 {
    debug_assert_eq!(values.len(), SIMD_WIDTH);
    f64x4::from([values[0], values[1], values[2], values[3]])
}

fn widen_f32x4(values: &[f32]) -> f64x4 {
    debug_assert_eq!(values.len(), SIMD_WIDTH);
    f64x4::from([
        f64::from(values[0]),
        f64::from(values[1]),
        f64::from(values[2]),
        f64::from(values[3]),
    ])
}

#[cfg(test)]
mod tests;
