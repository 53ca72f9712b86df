use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::series::{SeriesConfig, SeriesStore};

/// Partition of the series keyspace. A shard exclusively owns the series
/// routed to it; callers guard it with one reader/writer lock.
#[derive(Debug, Clone, Default)]
pub struct Shard {
    series: BTreeMap<String, SeriesStore>,
}

impl Shard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_series(&mut self, name: &str, config: SeriesConfig) -> Result<(), EngineError> {
        if self.series.contains_key(name) {
            return Err(EngineError::AlreadyExists {
                name: name.to_string(),
            });
        }
        let store = SeriesStore::new(name, config)?;
        self.series.insert(name.to_string(), store);
        Ok(())
    }

    /// Adds an already built series, used when staging a snapshot load.
    pub fn adopt_series(&mut self, store: SeriesStore) -> Result<(), EngineError> {
        if self.series.contains_key(store.name()) {
            return Err(EngineError::AlreadyExists {
                name: store.name().to_string(),
            });
        }
        self.series.insert(store.name().to_string(), store);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    pub fn series(&self, name: &str) -> Result<&SeriesStore, EngineError> {
        self.series
            .get(name)
            .ok_or_else(|| EngineError::series_not_found(name))
    }

    pub fn series_mut(&mut self, name: &str) -> Result<&mut SeriesStore, EngineError> {
        self.series
            .get_mut(name)
            .ok_or_else(|| EngineError::series_not_found(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.series.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeriesStore> + '_ {
        self.series.values()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Commits every series buffer; returns the number of points moved.
    pub fn flush(&mut self) -> usize {
        self.series.values_mut().map(SeriesStore::flush).sum()
    }
}
