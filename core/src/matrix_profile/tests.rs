use super::*;
use crate::point::DataPoint;
use crate::series::SeriesConfig;

fn store_from(rows: &[Vec<f32>]) -> SeriesStore {
    let dimension = rows.first().map_or(1, Vec::len);
    let config = SeriesConfig::with_options(dimension, true, 64).expect("config must be valid");
    let mut store = SeriesStore::new("mp", config).expect("series must be valid");
    for (index, values) in rows.iter().enumerate() {
        store
            .insert(DataPoint::new(1_000 + index as u64 * 10, values.clone()))
            .expect("insert must succeed");
    }
    store
}

fn pseudo_random_rows(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut state = seed;
    (0..count)
        .map(|_| {
            (0..dimension)
                .map(|_| {
                    state = state
                        .wrapping_mul(6_364_136_223_846_793_005)
                        .wrapping_add(1_442_695_040_888_963_407);
                    ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
                })
                .collect()
        })
        .collect()
}

fn sine_rows(count: usize, period: f32) -> Vec<Vec<f32>> {
    (0..count)
        .map(|index| {
            let phase = std::f32::consts::TAU * index as f32 / period;
            vec![phase.sin(), phase.cos()]
        })
        .collect()
}

fn znormalize(values: &[f64]) -> Vec<f64> {
    let width = values.len() as f64;
    let mean = values.iter().sum::<f64>() / width;
    let std = (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / width).sqrt();
    values.iter().map(|v| (v - mean) / std).collect()
}

/// Direct O(n^2 * w * d) profile, used as the reference.
fn naive_profile(rows: &[Vec<f32>], window: usize) -> Vec<f64> {
    let dimension = rows[0].len();
    let count = rows.len() - window + 1;
    let normalized: Vec<Vec<Vec<f64>>> = (0..count)
        .map(|start| {
            (0..dimension)
                .map(|dim| {
                    let values: Vec<f64> = rows[start..start + window]
                        .iter()
                        .map(|row| f64::from(row[dim]))
                        .collect();
                    znormalize(&values)
                })
                .collect()
        })
        .collect();

    (0..count)
        .map(|left| {
            (0..count)
                .filter(|right| left.abs_diff(*right) >= window)
                .map(|right| {
                    normalized[left]
                        .iter()
                        .zip(&normalized[right])
                        .map(|(a, b)| {
                            a.iter()
                                .zip(b)
                                .map(|(x, y)| (x - y) * (x - y))
                                .sum::<f64>()
                        })
                        .sum::<f64>()
                        .sqrt()
                })
                .fold(f64::INFINITY, f64::min)
        })
        .collect()
}

#[test]
fn matches_naive_reference_on_sequential_and_parallel_paths() {
    for (count, window, seed) in [(60, 5, 7), (400, 12, 99)] {
        let rows = pseudo_random_rows(count, 2, seed);
        let store = store_from(&rows);
        let profile = MatrixProfile::compute(&store, window).expect("profile must compute");
        let expected = naive_profile(&rows, window);

        assert_eq!(profile.profile().len(), expected.len());
        for (index, (got, want)) in profile.profile().iter().zip(&expected).enumerate() {
            assert!(
                (got - want).abs() < 1e-5,
                "index {index}: got {got}, want {want}"
            );
        }
    }
}

#[test]
fn neighbors_respect_exclusion_zone() {
    let window = 6;
    let store = store_from(&pseudo_random_rows(90, 3, 3));
    let profile = MatrixProfile::compute(&store, window).expect("profile must compute");

    for (index, neighbor) in profile.neighbors().iter().enumerate() {
        let neighbor = neighbor.expect("every subsequence has a neighbor here");
        assert!(index.abs_diff(neighbor) >= window);
    }
}

#[test]
fn repeated_subsequence_is_the_top_motif() {
    let window = 8;
    let mut rows = pseudo_random_rows(80, 2, 11);
    for offset in 0..window {
        rows[50 + offset] = rows[10 + offset].clone();
    }
    let store = store_from(&rows);
    let profile = MatrixProfile::compute(&store, window).expect("profile must compute");

    let motifs = profile.motifs(2);
    assert_eq!(motifs.len(), 2);
    assert!(motifs[0].score < 1e-3);
    assert_eq!(motifs[0].start_timestamp, 1_000 + 10 * 10);
    assert_eq!(motifs[1].start_timestamp, 1_000 + 50 * 10);
    assert_eq!(motifs[0].end_timestamp, 1_000 + 17 * 10);
    assert_eq!(motifs[0].window_size, window);
    assert_eq!(motifs[0].neighbor_timestamp, Some(1_000 + 50 * 10));
    assert_eq!(motifs[1].neighbor_timestamp, Some(1_000 + 10 * 10));
}

#[test]
fn injected_outlier_is_the_top_anomaly() {
    let window = 10;
    let mut rows = sine_rows(200, 25.0);
    for row in &mut rows[100..110] {
        for value in row.iter_mut() {
            *value *= 100.0;
        }
    }
    let store = store_from(&rows);
    let profile = MatrixProfile::compute(&store, window).expect("profile must compute");

    let top = &profile.anomalies(1)[0];
    let start = ((top.start_timestamp - 1_000) / 10) as usize;
    assert!(start + window > 100 && start < 110, "start {start}");
    assert!(top.score > 1.0);
}

#[test]
fn oversized_k_returns_every_eligible_window() {
    let window = 5;
    let store = store_from(&pseudo_random_rows(40, 1, 17));
    let profile = MatrixProfile::compute(&store, window).expect("profile must compute");

    let anomalies = profile.anomalies(usize::MAX / 4);
    let motifs = profile.motifs(usize::MAX);
    assert!(!anomalies.is_empty());
    assert!(anomalies.len() <= profile.profile().len());
    assert_eq!(anomalies.len(), motifs.len());
}

#[test]
fn selections_do_not_overlap() {
    let window = 5;
    let store = store_from(&pseudo_random_rows(120, 1, 5));
    let profile = MatrixProfile::compute(&store, window).expect("profile must compute");

    for entries in [profile.anomalies(6), profile.motifs(6)] {
        assert_eq!(entries.len(), 6);
        for (position, entry) in entries.iter().enumerate() {
            for other in &entries[position + 1..] {
                assert!(entry.start_timestamp.abs_diff(other.start_timestamp) >= 10 * window as u64);
            }
        }
    }

    let anomalies = profile.anomalies(6);
    assert!(anomalies
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));
    let motifs = profile.motifs(6);
    assert!(motifs.windows(2).all(|pair| pair[0].score <= pair[1].score));
    assert!(profile.anomalies(0).is_empty());
}

#[test]
fn constant_windows_produce_finite_scores() {
    let flat = vec![vec![5.0f32, -2.0]; 30];
    let store = store_from(&flat);
    let profile = MatrixProfile::compute(&store, 5).expect("profile must compute");
    assert!(profile.profile().iter().all(|value| *value == 0.0));

    let mut mixed = vec![vec![1.0f32, 1.0]; 30];
    mixed.extend(sine_rows(30, 7.0));
    let store = store_from(&mixed);
    let profile = MatrixProfile::compute(&store, 5).expect("profile must compute");
    assert!(profile
        .profile()
        .iter()
        .all(|value| value.is_finite() && *value >= 0.0));
    let top = &profile.anomalies(1)[0];
    assert!(top.score.is_finite());
}

#[test]
fn rejects_bad_windows_and_short_series() {
    let store = store_from(&pseudo_random_rows(10, 1, 1));

    assert!(matches!(
        MatrixProfile::compute(&store, 0),
        Err(EngineError::InvalidWindow {
            window: 0,
            points: 10
        })
    ));
    assert!(matches!(
        MatrixProfile::compute(&store, 1_000_000),
        Err(EngineError::InvalidWindow { points: 10, .. })
    ));
    assert!(matches!(
        MatrixProfile::compute(&store, 10),
        Err(EngineError::InvalidWindow { .. })
    ));
    assert!(matches!(
        MatrixProfile::compute(&store, 6),
        Err(EngineError::InsufficientData {
            required: 12,
            available: 10
        })
    ));
    assert!(MatrixProfile::compute(&store, 5).is_ok());
}
