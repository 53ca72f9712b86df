use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::{self, JoinHandle};
use tokio::time::MissedTickBehavior;
use vectis_core::{EngineError, ReloadOutcome, SaveSummary};

use crate::state::AppState;

const MIN_AUTOSAVE_TICK: Duration = Duration::from_millis(10);
const MAX_AUTOSAVE_TICK: Duration = Duration::from_secs(1);

/// Handles of the autosave and autoreload loops.
pub(crate) struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub(crate) fn abort(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}

/// Restores the snapshot at the configured path. A missing file starts an
/// empty database; an unreadable one aborts startup.
pub(crate) async fn load_on_startup(state: &AppState) -> Result<()> {
    if !state.config.load_on_startup {
        return Ok(());
    }

    let path = state.config.data_path.clone();
    let task_state = state.clone();
    let loaded = task::spawn_blocking(move || {
        task_state
            .persistence
            .load_if_exists(&task_state.database)
    })
    .await
    .context("startup load task failed")?
    .with_context(|| format!("failed to load snapshot from {}", path.display()))?;

    match loaded {
        Some(summary) => tracing::info!(
            path = %path.display(),
            series = summary.series,
            points = summary.points,
            "snapshot restored"
        ),
        None => tracing::info!(path = %path.display(), "no snapshot found, starting empty"),
    }
    Ok(())
}

pub(crate) fn spawn_background_tasks(state: &AppState) -> BackgroundTasks {
    let mut handles = Vec::new();

    if let Some(interval) = state.persistence.policy().save_interval {
        handles.push(tokio::spawn(autosave_loop(state.clone(), interval)));
    }
    if state.persistence.policy().auto_reload {
        handles.push(tokio::spawn(autoreload_loop(
            state.clone(),
            state.config.autoreload_poll,
        )));
    }

    BackgroundTasks { handles }
}

/// Writes pending changes before exit when any autosave trigger is configured.
pub(crate) async fn final_save(state: &AppState) {
    if !state.persistence.policy().autosave_enabled() {
        return;
    }

    let task_state = state.clone();
    let saved = task::spawn_blocking(move || -> Result<Option<SaveSummary>, EngineError> {
        let persistence = &task_state.persistence;
        if !persistence.is_dirty(&task_state.database)? {
            return Ok(None);
        }
        persistence.save_now(&task_state.database).map(Some)
    })
    .await;

    match saved {
        Ok(Ok(Some(summary))) => tracing::info!(
            series = summary.series,
            points = summary.points,
            "final snapshot saved"
        ),
        Ok(Ok(None)) => {}
        Ok(Err(error)) => tracing::error!(%error, "final snapshot failed"),
        Err(error) => tracing::error!(%error, "final snapshot task failed"),
    }
}

fn autosave_tick(interval: Duration) -> Duration {
    (interval / 4).clamp(MIN_AUTOSAVE_TICK, MAX_AUTOSAVE_TICK)
}

async fn autosave_loop(state: AppState, interval: Duration) {
    let mut ticker = tokio::time::interval(autosave_tick(interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let task_state = state.clone();
        let result = task::spawn_blocking(move || {
            task_state
                .persistence
                .maybe_autosave(&task_state.database)
        })
        .await;

        match result {
            Ok(Ok(Some((trigger, summary)))) => tracing::info!(
                trigger = trigger.as_str(),
                series = summary.series,
                points = summary.points,
                bytes = summary.bytes,
                "autosave completed"
            ),
            Ok(Ok(None)) => {}
            Ok(Err(error)) => tracing::error!(%error, "autosave failed"),
            Err(error) => tracing::error!(%error, "autosave task failed"),
        }
    }
}

async fn autoreload_loop(state: AppState, poll: Duration) {
    let mut ticker = tokio::time::interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let task_state = state.clone();
        let result = task::spawn_blocking(move || {
            task_state.persistence.check_reload(&task_state.database)
        })
        .await;

        match result {
            Ok(Ok(ReloadOutcome::Reloaded(summary))) => tracing::info!(
                series = summary.series,
                points = summary.points,
                "snapshot changed on disk, reloaded"
            ),
            Ok(Ok(_)) => {}
            Ok(Err(error)) => tracing::warn!(%error, "autoreload failed"),
            Err(error) => tracing::error!(%error, "autoreload task failed"),
        }
    }
}
