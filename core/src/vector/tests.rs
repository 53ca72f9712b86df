use super::*;

fn deterministic_vector(seed: usize, len: usize) -> Vec<f32> {
    (0..len)
        .map(|index| {
            let mixed = seed
                .wrapping_mul(1_103_515_245)
                .wrapping_add(index.wrapping_mul(12_345))
                .wrapping_add(97);
            let base = (mixed % 10_000) as f32 / 5_000.0;
            base - 1.0
        })
        .collect()
}

fn reference_cosine(left: &[f32], right: &[f32]) -> f64 {
    let dot: f64 = left
        .iter()
        .zip(right)
        .map(|(l, r)| f64::from(*l) * f64::from(*r))
        .sum();
    let left_norm = left.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt();
    let right_norm = right.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt();
    dot / (left_norm * right_norm)
}

#[test]
fn prepared_cosine_matches_scalar_reference_across_dimensions() {
    for len in [1usize, 2, 3, 4, 5, 7, 8, 9, 16, 17, 64, 65, 127, 128, 129] {
        let query = deterministic_vector(23, len);
        let candidate = deterministic_vector(47, len);
        let value = PreparedCosineQuery::new(&query).cosine_or_zero(&candidate);
        let reference = reference_cosine(&query, &candidate);
        assert!(
            (f64::from(value) - reference).abs() < 1e-6,
            "len {len}: {value} vs {reference}"
        );
    }
}

#[test]
fn self_similarity_is_one_at_any_magnitude() {
    for scale in [1.0f32, 1e-25, 1e-40, 1e20, 3e38] {
        let vector: Vec<f32> = deterministic_vector(5, 37)
            .into_iter()
            .map(|value| value * scale)
            .collect();
        let value = PreparedCosineQuery::new(&vector).cosine_or_zero(&vector);
        assert!((value - 1.0).abs() < 1e-6, "scale {scale}: {value}");
    }

    let huge = [1e20f32, 0.0];
    let tiny = [1e-25f32, 0.0];
    assert_eq!(PreparedCosineQuery::new(&huge).cosine_or_zero(&tiny), 1.0);
    assert_eq!(PreparedCosineQuery::new(&tiny).cosine_or_zero(&huge), 1.0);
}

#[test]
fn opposite_and_orthogonal_vectors() {
    let prepared = PreparedCosineQuery::new(&[1.0, 2.0, 3.0]);
    assert!((prepared.cosine_or_zero(&[-1.0, -2.0, -3.0]) + 1.0).abs() < 1e-6);
    assert!(prepared.cosine_or_zero(&[3.0, 0.0, -1.0]).abs() < 1e-6);
}

#[test]
fn zero_vectors_score_zero() {
    let prepared = PreparedCosineQuery::new(&[0.0f32, 0.0]);
    assert_eq!(prepared.cosine_or_zero(&[1.0, 2.0]), 0.0);

    let prepared = PreparedCosineQuery::new(&[1.0f32, 2.0]);
    assert_eq!(prepared.cosine_or_zero(&[0.0, 0.0]), 0.0);
}

#[test]
fn non_finite_candidates_yield_nan() {
    let prepared = PreparedCosineQuery::new(&[1.0f32, 2.0]);
    assert!(prepared.cosine_or_zero(&[f32::NAN, 1.0]).is_nan());
}

#[test]
fn f64_dot_matches_scalar_reference() {
    for len in [1usize, 3, 4, 5, 8, 13, 64, 100] {
        let left: Vec<f64> = deterministic_vector(3, len).into_iter().map(f64::from).collect();
        let right: Vec<f64> = deterministic_vector(9, len).into_iter().map(f64::from).collect();
        let reference: f64 = left.iter().zip(&right).map(|(l, r)| l * r).sum();
        let value = dot_f64_unchecked(&left, &right);
        assert!((value - reference).abs() < 1e-9, "{value} vs {reference}");
    }
}
