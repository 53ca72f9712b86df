use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use vectis_core::{Database, PersistenceManager};

use crate::config::AppConfig;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) database: Arc<Database>,
    pub(crate) persistence: Arc<PersistenceManager>,
    pub(crate) connections: Arc<Semaphore>,
}

impl AppState {
    pub(crate) fn new(config: AppConfig) -> Result<Self> {
        let database =
            Database::new(config.engine_config()).context("invalid engine configuration")?;
        let persistence = PersistenceManager::new(config.persistence_policy());

        Ok(Self {
            connections: Arc::new(Semaphore::new(config.max_connections)),
            config: Arc::new(config),
            database: Arc::new(database),
            persistence: Arc::new(persistence),
        })
    }
}
