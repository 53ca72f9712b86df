use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::EngineError;
use crate::series::SeriesConfig;
use crate::shard::Shard;

/// Immutable-after-construction shard table. Routing is a CRC32 of the series
/// name modulo the shard count, so it is stable across restarts as long as the
/// shard count does not change.
#[derive(Debug)]
pub struct ShardRouter {
    shards: Vec<RwLock<Shard>>,
}

impl ShardRouter {
    pub fn new(shard_count: usize) -> Result<Self, EngineError> {
        if shard_count == 0 {
            return Err(EngineError::invalid_argument("shard count must be > 0"));
        }

        Ok(Self {
            shards: (0..shard_count).map(|_| RwLock::new(Shard::new())).collect(),
        })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn route(&self, name: &str) -> usize {
        route_name(name, self.shards.len())
    }

    pub fn read(&self, index: usize) -> Result<RwLockReadGuard<'_, Shard>, EngineError> {
        self.shards[index]
            .read()
            .map_err(|_| EngineError::lock_poisoned("shard"))
    }

    pub fn write(&self, index: usize) -> Result<RwLockWriteGuard<'_, Shard>, EngineError> {
        self.shards[index]
            .write()
            .map_err(|_| EngineError::lock_poisoned("shard"))
    }

    pub fn read_for(&self, name: &str) -> Result<RwLockReadGuard<'_, Shard>, EngineError> {
        self.read(self.route(name))
    }

    pub fn write_for(&self, name: &str) -> Result<RwLockWriteGuard<'_, Shard>, EngineError> {
        self.write(self.route(name))
    }

    /// Creates a series in the shard that owns `name`.
    pub fn create(&self, name: &str, config: SeriesConfig) -> Result<(), EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::invalid_argument(
                "series name must not be empty",
            ));
        }
        self.write_for(name)?.create_series(name, config)
    }

    /// Read guards on every shard, acquired in index order.
    pub fn read_all(&self) -> Result<Vec<RwLockReadGuard<'_, Shard>>, EngineError> {
        (0..self.shards.len()).map(|index| self.read(index)).collect()
    }

    /// Write guards on every shard, acquired in index order.
    pub(crate) fn write_all(&self) -> Result<Vec<RwLockWriteGuard<'_, Shard>>, EngineError> {
        (0..self.shards.len()).map(|index| self.write(index)).collect()
    }

    /// Empty unlocked shard table of the same shape, used to stage a load.
    pub(crate) fn staging(&self) -> Vec<Shard> {
        (0..self.shards.len()).map(|_| Shard::new()).collect()
    }
}

pub(crate) fn route_name(name: &str, shard_count: usize) -> usize {
    debug_assert!(shard_count > 0);
    (crc32fast::hash(name.as_bytes()) as usize) % shard_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_is_deterministic_and_in_range() {
        let router = ShardRouter::new(64).expect("router must build");
        for name in ["cpu", "mem", "disk", "sensor-17", "btc_eth"] {
            let first = router.route(name);
            assert!(first < 64);
            assert_eq!(router.route(name), first);
            assert_eq!(route_name(name, 64), first);
        }
    }

    #[test]
    fn zero_shards_is_rejected() {
        assert!(matches!(
            ShardRouter::new(0),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn create_lands_in_routed_shard_only() {
        let router = ShardRouter::new(8).expect("router must build");
        let config = SeriesConfig::new(2).expect("config");
        router.create("cpu", config).expect("create");

        let owner = router.route("cpu");
        for index in 0..router.shard_count() {
            let shard = router.read(index).expect("lock");
            assert_eq!(shard.contains("cpu"), index == owner);
        }

        let error = router.create("cpu", config).expect_err("must fail");
        assert!(matches!(error, EngineError::AlreadyExists { .. }));
    }

    #[test]
    fn blank_names_are_rejected() {
        let router = ShardRouter::new(4).expect("router must build");
        let config = SeriesConfig::new(2).expect("config");
        assert!(matches!(
            router.create("  ", config),
            Err(EngineError::InvalidArgument(_))
        ));
    }
}
