#![forbid(unsafe_code)]
//! Vectis line-protocol server.
//!
//! Every request is one line, either the text grammar (`CREATE cpu 3`,
//! `INSERT cpu 1,2,3`, `ANOMALY cpu 24 3`, ...) or a JSON envelope
//! `{"type": "...", "data": {...}}`. Every response is one JSON line
//! `{"status": "...", "data": ...}`. Send `HELP` for the full grammar.

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod connection;
mod env_utils;
mod errors;
mod handlers;
mod models;
mod persistence;
mod state;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let bind = config.bind;
    let state = AppState::new(config.clone())?;

    persistence::load_on_startup(&state).await?;
    let background = persistence::spawn_background_tasks(&state);

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind server socket on {bind}"))?;

    tracing::info!(
        %bind,
        shard_count = config.shard_count,
        max_dimension = config.max_dimension,
        strict_finite = config.strict_finite,
        max_line_bytes = config.max_line_bytes,
        max_connections = config.max_connections,
        data_path = %config.data_path.display(),
        autosave_interval_secs = config.autosave_interval.as_secs(),
        autosave_every_mutations = config.autosave_every_mutations,
        autoreload = config.autoreload,
        "vectis server started"
    );

    let served = connection::serve(listener, state.clone(), shutdown_signal())
        .await
        .context("server exited unexpectedly");

    background.abort();
    persistence::final_save(&state).await;
    served
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(error) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("failed to initialize tracing subscriber: {error}");
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(error) => tracing::error!(%error, "failed to install Ctrl-C handler"),
    }
}
