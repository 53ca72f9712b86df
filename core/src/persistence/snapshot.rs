use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::database::EngineConfig;
use crate::error::EngineError;
use crate::point::{DataPoint, PointRef};
use crate::series::{SeriesConfig, SeriesStore};

use super::fsync::{ensure_parent_dir, sync_parent_dir, temp_path_for};
use super::{PersistenceError, SaveSummary};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct SnapshotOut<'a> {
    version: u32,
    series: Vec<SeriesOut<'a>>,
}

#[derive(Debug, Serialize)]
struct SeriesOut<'a> {
    name: &'a str,
    dimension: usize,
    total_points: u64,
    points: Vec<PointRef<'a>>,
}

#[derive(Debug, Deserialize)]
struct SnapshotIn {
    version: u32,
    series: Vec<SeriesIn>,
}

#[derive(Debug, Deserialize)]
struct SeriesIn {
    name: String,
    dimension: usize,
    #[serde(default)]
    total_points: u64,
    points: Vec<DataPoint>,
}

/// Writes every series to `path` through a synced temp file and an atomic
/// rename. On failure the previous file at `path`, if any, is intact.
pub(crate) fn write_snapshot<'a>(
    path: &Path,
    series: impl Iterator<Item = &'a SeriesStore>,
) -> Result<SaveSummary, PersistenceError> {
    ensure_parent_dir(path)?;

    let series: Vec<SeriesOut<'a>> = series
        .map(|store| SeriesOut {
            name: store.name(),
            dimension: store.dimension(),
            total_points: store.total_points(),
            points: store.iter().collect(),
        })
        .collect();
    let points: usize = series.iter().map(|entry| entry.points.len()).sum();
    let document = SnapshotOut {
        version: SNAPSHOT_VERSION,
        series,
    };

    let temp_path = temp_path_for(path);
    let written = write_synced(&temp_path, &document).and_then(|bytes| {
        fs::rename(&temp_path, path)?;
        sync_parent_dir(path)?;
        Ok(bytes)
    });
    let bytes = match written {
        Ok(bytes) => bytes,
        Err(error) => {
            let _ = fs::remove_file(&temp_path);
            return Err(error);
        }
    };

    Ok(SaveSummary {
        series: document.series.len(),
        points,
        bytes,
    })
}

fn write_synced(path: &Path, document: &SnapshotOut<'_>) -> Result<u64, PersistenceError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, document)?;
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|error| PersistenceError::Io(error.into_error()))?;
    file.sync_all()?;
    Ok(file.metadata()?.len())
}

/// Parses and validates a snapshot into detached series. Nothing live is
/// touched here; callers swap the result in.
pub(crate) fn read_snapshot(
    path: &Path,
    config: &EngineConfig,
) -> Result<Vec<SeriesStore>, PersistenceError> {
    let raw = fs::read(path)?;
    let snapshot: SnapshotIn = serde_json::from_slice(&raw)?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(PersistenceError::InvalidData(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }

    let mut seen = BTreeSet::new();
    let mut stores = Vec::with_capacity(snapshot.series.len());
    for entry in snapshot.series {
        if !seen.insert(entry.name.clone()) {
            return Err(PersistenceError::InvalidData(format!(
                "duplicate series '{}' in snapshot",
                entry.name
            )));
        }
        if entry.dimension > config.max_dimension {
            return Err(PersistenceError::InvalidData(format!(
                "series '{}' dimension {} exceeds maximum {}",
                entry.name, entry.dimension, config.max_dimension
            )));
        }

        let invalid = |error: EngineError| {
            PersistenceError::InvalidData(format!("series '{}': {error}", entry.name))
        };
        let series_config =
            SeriesConfig::with_options(entry.dimension, config.strict_finite, config.buffer_capacity)
                .map_err(invalid)?;
        let store = SeriesStore::restore(
            entry.name.clone(),
            series_config,
            entry.points,
            entry.total_points,
        )
        .map_err(invalid)?;
        stores.push(store);
    }

    Ok(stores)
}
