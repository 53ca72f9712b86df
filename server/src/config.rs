use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use vectis_core::{EngineConfig, PersistencePolicy};

use crate::env_utils::{parse_bool_env, parse_path, parse_socket_addr, parse_u64, parse_usize};

pub(crate) const DEFAULT_BIND: &str = "127.0.0.1:9999";

#[derive(Debug, Clone)]
pub(crate) struct AppConfig {
    pub(crate) bind: SocketAddr,
    pub(crate) shard_count: usize,
    pub(crate) buffer_capacity: usize,
    pub(crate) max_dimension: usize,
    pub(crate) strict_finite: bool,
    pub(crate) max_line_bytes: usize,
    pub(crate) max_connections: usize,
    pub(crate) data_path: PathBuf,
    pub(crate) load_on_startup: bool,
    /// Zero disables the interval trigger.
    pub(crate) autosave_interval: Duration,
    /// Zero disables the mutation-count trigger.
    pub(crate) autosave_every_mutations: u64,
    pub(crate) autoreload: bool,
    pub(crate) autoreload_poll: Duration,
}

impl AppConfig {
    pub(crate) fn from_env() -> Result<Self> {
        let bind = parse_socket_addr("VECTIS_BIND", DEFAULT_BIND)?;
        let shard_count = parse_usize("VECTIS_SHARD_COUNT", 64)?;
        let buffer_capacity = parse_usize("VECTIS_BUFFER_CAPACITY", 10_000)?;
        let max_dimension = parse_usize("VECTIS_MAX_DIMENSION", 4096)?;
        let strict_finite = parse_bool_env("VECTIS_STRICT_FINITE", true)?;
        let max_line_bytes = parse_usize("VECTIS_MAX_LINE_BYTES", 1_048_576)?;
        let max_connections = parse_usize("VECTIS_MAX_CONNECTIONS", 256)?;
        let data_path = parse_path("VECTIS_DATA_PATH", "data/vectis.json")?;
        let load_on_startup = parse_bool_env("VECTIS_LOAD_ON_STARTUP", true)?;
        let autosave_interval_seconds = parse_u64("VECTIS_AUTOSAVE_INTERVAL_SECONDS", 60)?;
        let autosave_every_mutations = parse_u64("VECTIS_AUTOSAVE_EVERY_MUTATIONS", 0)?;
        let autoreload = parse_bool_env("VECTIS_AUTORELOAD", false)?;
        let autoreload_poll_ms = parse_u64("VECTIS_AUTORELOAD_POLL_MS", 1000)?;

        if shard_count == 0 {
            anyhow::bail!("VECTIS_SHARD_COUNT must be > 0");
        }
        if buffer_capacity == 0 {
            anyhow::bail!("VECTIS_BUFFER_CAPACITY must be > 0");
        }
        if max_dimension == 0 {
            anyhow::bail!("VECTIS_MAX_DIMENSION must be > 0");
        }
        if max_line_bytes == 0 {
            anyhow::bail!("VECTIS_MAX_LINE_BYTES must be > 0");
        }
        if max_connections == 0 {
            anyhow::bail!("VECTIS_MAX_CONNECTIONS must be > 0");
        }
        if autoreload && autoreload_poll_ms == 0 {
            anyhow::bail!("VECTIS_AUTORELOAD_POLL_MS must be > 0 when VECTIS_AUTORELOAD is on");
        }

        Ok(Self {
            bind,
            shard_count,
            buffer_capacity,
            max_dimension,
            strict_finite,
            max_line_bytes,
            max_connections,
            data_path,
            load_on_startup,
            autosave_interval: Duration::from_secs(autosave_interval_seconds),
            autosave_every_mutations,
            autoreload,
            autoreload_poll: Duration::from_millis(autoreload_poll_ms),
        })
    }

    pub(crate) fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            shard_count: self.shard_count,
            buffer_capacity: self.buffer_capacity,
            max_dimension: self.max_dimension,
            strict_finite: self.strict_finite,
        }
    }

    pub(crate) fn persistence_policy(&self) -> PersistencePolicy {
        PersistencePolicy::new(&self.data_path)
            .with_save_interval(self.autosave_interval)
            .with_save_every_mutations(self.autosave_every_mutations)
            .with_auto_reload(self.autoreload)
    }
}
