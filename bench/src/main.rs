#![forbid(unsafe_code)]
//! Engine benchmarks for Vectis.
//!
//! Scenarios:
//! - `insert`: buffered inserts into one series, including flushes
//! - `similar`: cosine top-k over a populated series
//! - `profile`: matrix profile anomalies and motifs over a univariate series

use std::env;
use std::process;
use std::time::{Duration, Instant};

use vectis_core::{Database, EngineConfig, PointInput};

const DIMENSION: usize = 128;
const DATASET_SIZE: usize = 10_000;
const TOP_K: usize = 10;
const PROFILE_POINTS: usize = 4_096;
const PROFILE_WINDOW: usize = 64;
const WARMUP_RUNS: usize = 5;
const MEASURED_RUNS: usize = 30;
const PROFILE_WARMUP_RUNS: usize = 1;
const PROFILE_MEASURED_RUNS: usize = 5;

fn main() {
    if cfg!(debug_assertions) && env::var("VECTIS_ALLOW_DEBUG_BENCH").as_deref() != Ok("1") {
        eprintln!(
            "error=debug_build_not_allowed message=\"run `cargo run --release -p vectis-bench`\""
        );
        process::exit(2);
    }

    let mode = if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    };

    let scenario = env::var("VECTIS_BENCH_SCENARIO").unwrap_or_else(|_| "all".to_string());
    let ok = match scenario.as_str() {
        "all" => run_insert_bench(mode) && run_similar_bench(mode) && run_profile_bench(mode),
        "insert" => run_insert_bench(mode),
        "similar" => run_similar_bench(mode),
        "profile" => run_profile_bench(mode),
        _ => {
            eprintln!(
                "error=invalid_scenario scenario=\"{scenario}\" allowed=\"all,insert,similar,profile\""
            );
            false
        }
    };

    if !ok {
        process::exit(1);
    }
}

fn run_insert_bench(mode: &str) -> bool {
    for _ in 0..WARMUP_RUNS {
        if run_insert_once().is_none() {
            return false;
        }
    }

    let mut samples_ms = Vec::with_capacity(MEASURED_RUNS);
    let mut total = Duration::ZERO;
    for _ in 0..MEASURED_RUNS {
        let Some(elapsed) = run_insert_once() else {
            return false;
        };
        samples_ms.push(elapsed.as_secs_f64() * 1_000.0);
        total += elapsed;
    }

    let (p50_ms, p95_ms, avg_ms) = summarize_ms(&samples_ms);
    let qps = (MEASURED_RUNS * DATASET_SIZE) as f64 / total.as_secs_f64();
    println!(
        "bench=insert mode={mode} points={DATASET_SIZE} dimension={DIMENSION} warmup_runs={WARMUP_RUNS} measured_runs={MEASURED_RUNS} p50_ms={p50_ms:.6} p95_ms={p95_ms:.6} avg_ms={avg_ms:.6} qps={qps:.2}"
    );
    true
}

fn run_similar_bench(mode: &str) -> bool {
    let Some(database) = populated_database("vectors", DIMENSION, DATASET_SIZE) else {
        return false;
    };
    let query = deterministic_vector(42, DIMENSION);

    let mut samples_ms = Vec::with_capacity(MEASURED_RUNS);
    let mut best_similarity = 0.0f32;
    for run in 0..WARMUP_RUNS + MEASURED_RUNS {
        let started = Instant::now();
        let matches = match database.find_similar("vectors", &query, TOP_K, 0.0) {
            Ok(matches) => matches,
            Err(error) => {
                eprintln!("error=find_similar_failed detail=\"{error}\"");
                return false;
            }
        };
        let elapsed = started.elapsed();
        if run >= WARMUP_RUNS {
            samples_ms.push(elapsed.as_secs_f64() * 1_000.0);
            best_similarity = matches.first().map_or(0.0, |entry| entry.similarity);
        }
    }

    let (p50_ms, p95_ms, avg_ms) = summarize_ms(&samples_ms);
    println!(
        "bench=similar mode={mode} dataset_size={DATASET_SIZE} dimension={DIMENSION} k={TOP_K} warmup_runs={WARMUP_RUNS} measured_runs={MEASURED_RUNS} p50_ms={p50_ms:.6} p95_ms={p95_ms:.6} avg_ms={avg_ms:.6} best_similarity={best_similarity:.6}"
    );
    true
}

fn run_profile_bench(mode: &str) -> bool {
    let database = match Database::new(EngineConfig::default()) {
        Ok(database) => database,
        Err(error) => {
            eprintln!("error=database_create_failed detail=\"{error}\"");
            return false;
        }
    };
    if let Err(error) = database.create_series("signal", 1) {
        eprintln!("error=create_series_failed detail=\"{error}\"");
        return false;
    }
    let points = (0..PROFILE_POINTS)
        .map(|index| {
            let phase = index as f32 * 0.05;
            let noise = deterministic_vector(index as u64, 1)[0] * 0.1;
            PointInput::at(index as u64, vec![phase.sin() + noise])
        })
        .collect();
    if let Err(error) = database.insert_batch("signal", points) {
        eprintln!("error=insert_batch_failed detail=\"{error}\"");
        return false;
    }

    let mut anomaly_ms = Vec::with_capacity(PROFILE_MEASURED_RUNS);
    let mut motif_ms = Vec::with_capacity(PROFILE_MEASURED_RUNS);
    let mut top_score = 0.0f64;
    for run in 0..PROFILE_WARMUP_RUNS + PROFILE_MEASURED_RUNS {
        let started = Instant::now();
        let anomalies = match database.anomalies("signal", PROFILE_WINDOW, 3) {
            Ok(entries) => entries,
            Err(error) => {
                eprintln!("error=anomalies_failed detail=\"{error}\"");
                return false;
            }
        };
        let anomaly_elapsed = started.elapsed();

        let started = Instant::now();
        if let Err(error) = database.motifs("signal", PROFILE_WINDOW, 3) {
            eprintln!("error=motifs_failed detail=\"{error}\"");
            return false;
        }
        let motif_elapsed = started.elapsed();

        if run >= PROFILE_WARMUP_RUNS {
            anomaly_ms.push(anomaly_elapsed.as_secs_f64() * 1_000.0);
            motif_ms.push(motif_elapsed.as_secs_f64() * 1_000.0);
            top_score = anomalies.first().map_or(0.0, |entry| entry.score);
        }
    }

    let (anomaly_p50_ms, anomaly_p95_ms, anomaly_avg_ms) = summarize_ms(&anomaly_ms);
    let (motif_p50_ms, motif_p95_ms, motif_avg_ms) = summarize_ms(&motif_ms);
    println!(
        "bench=matrix_profile mode={mode} points={PROFILE_POINTS} window={PROFILE_WINDOW} warmup_runs={PROFILE_WARMUP_RUNS} measured_runs={PROFILE_MEASURED_RUNS} anomaly_p50_ms={anomaly_p50_ms:.6} anomaly_p95_ms={anomaly_p95_ms:.6} anomaly_avg_ms={anomaly_avg_ms:.6} motif_p50_ms={motif_p50_ms:.6} motif_p95_ms={motif_p95_ms:.6} motif_avg_ms={motif_avg_ms:.6} top_anomaly_score={top_score:.6}"
    );
    true
}

fn run_insert_once() -> Option<Duration> {
    let started = Instant::now();
    populated_database("bench", DIMENSION, DATASET_SIZE)?;
    Some(started.elapsed())
}

fn populated_database(series: &str, dimension: usize, points: usize) -> Option<Database> {
    let database = match Database::new(EngineConfig::default()) {
        Ok(database) => database,
        Err(error) => {
            eprintln!("error=database_create_failed detail=\"{error}\"");
            return None;
        }
    };
    if let Err(error) = database.create_series(series, dimension) {
        eprintln!("error=create_series_failed detail=\"{error}\"");
        return None;
    }

    for index in 0..points {
        let values = deterministic_vector(index as u64, dimension);
        if let Err(error) = database.insert(series, PointInput::at(index as u64, values)) {
            eprintln!("error=insert_failed index={index} detail=\"{error}\"");
            return None;
        }
    }
    Some(database)
}

fn summarize_ms(samples_ms: &[f64]) -> (f64, f64, f64) {
    let p50_ms = percentile_ms(samples_ms, 0.50);
    let p95_ms = percentile_ms(samples_ms, 0.95);
    let avg_ms = samples_ms.iter().sum::<f64>() / samples_ms.len().max(1) as f64;
    (p50_ms, p95_ms, avg_ms)
}

fn percentile_ms(samples_ms: &[f64], quantile: f64) -> f64 {
    if samples_ms.is_empty() {
        return 0.0;
    }

    let mut sorted = samples_ms.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last_index = sorted.len().saturating_sub(1);
    let position = (quantile.clamp(0.0, 1.0) * last_index as f64).round() as usize;
    sorted[position]
}

fn deterministic_vector(seed: u64, dimension: usize) -> Vec<f32> {
    (0..dimension)
        .map(|index| {
            let mixed = (seed as usize)
                .wrapping_mul(31)
                .wrapping_add(index.wrapping_mul(17))
                % 10_000;
            mixed as f32 / 10_000.0 - 0.5
        })
        .collect()
}
