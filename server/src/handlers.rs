use std::time::Instant;

use tokio::task;

use crate::commands::{parse_line, Command, HELP_TEXT};
use crate::errors::ProtocolError;
use crate::models::Response;
use crate::state::AppState;

pub(crate) async fn handle_line(state: &AppState, line: &str) -> Response {
    match parse_line(line) {
        Ok(command) => execute(state, command).await,
        Err(error) => {
            tracing::debug!(code = error.code(), "rejected request line");
            error.into()
        }
    }
}

/// Runs one command on the blocking pool. A client that disconnects does not
/// cancel work already started.
pub(crate) async fn execute(state: &AppState, command: Command) -> Response {
    let name = command.name();
    let started = Instant::now();
    let state = state.clone();

    match task::spawn_blocking(move || execute_blocking(&state, command)).await {
        Ok(Ok(response)) => {
            tracing::debug!(
                command = name,
                elapsed_us = started.elapsed().as_micros() as u64,
                "command completed"
            );
            response
        }
        Ok(Err(error)) => {
            tracing::debug!(command = name, code = error.code(), "command failed");
            error.into()
        }
        Err(error) => {
            tracing::error!(%error, command = name, "command task failed");
            ProtocolError::internal("command execution failed").into()
        }
    }
}

fn execute_blocking(state: &AppState, command: Command) -> Result<Response, ProtocolError> {
    let database = state.database.as_ref();
    let mutation = command.is_mutation();

    let response = match command {
        Command::Create { name, dimension } => {
            database.create_series(&name, dimension)?;
            Response::success(format!("created series '{name}'"))
        }
        Command::Insert { series, point } => Response::inserted(database.insert(&series, point)?),
        Command::InsertBatch { series, points } => {
            Response::counted("inserted", database.insert_batch(&series, points)?)
        }
        Command::Query { series, hours_back } => {
            Response::Data(database.query(&series, hours_back)?)
        }
        Command::QueryRange { series, start, end } => {
            Response::Data(database.query_range(&series, start, end)?)
        }
        Command::Similar {
            series,
            vector,
            limit,
            threshold,
        } => Response::Similar(database.find_similar(&series, &vector, limit, threshold)?),
        Command::Anomaly { series, window, k } => {
            Response::Anomalies(database.anomalies(&series, window, k)?)
        }
        Command::Motif { series, window, k } => {
            Response::Motifs(database.motifs(&series, window, k)?)
        }
        Command::Stats { series } => Response::Stats(database.stats(&series)?),
        Command::List => Response::SeriesList(database.list()?),
        Command::Export { series } => Response::SeriesExport(database.export(&series)?),
        Command::Save { path } => {
            let path = path.unwrap_or_else(|| state.config.data_path.clone());
            let summary = state.persistence.save_to(database, &path)?;
            tracing::info!(
                path = %path.display(),
                series = summary.series,
                points = summary.points,
                bytes = summary.bytes,
                "snapshot saved"
            );
            Response::counted(
                format!("saved {} series to {}", summary.series, path.display()),
                summary.points,
            )
        }
        Command::Load { path } => {
            let path = path.unwrap_or_else(|| state.config.data_path.clone());
            let summary = state.persistence.load_from(database, &path)?;
            tracing::info!(
                path = %path.display(),
                series = summary.series,
                points = summary.points,
                "snapshot loaded"
            );
            Response::counted(
                format!("loaded {} series from {}", summary.series, path.display()),
                summary.points,
            )
        }
        Command::Flush => Response::counted("flushed", database.flush()?),
        Command::Ping => Response::Pong,
        Command::Help => Response::success(HELP_TEXT),
    };

    if mutation {
        autosave_after_mutation(state);
    }
    Ok(response)
}

/// Applies the mutation-count trigger inline so the response is sent after
/// the save. Failures are logged; the mutation itself already succeeded.
fn autosave_after_mutation(state: &AppState) {
    if state.persistence.policy().save_every_mutations.is_none() {
        return;
    }

    match state.persistence.maybe_autosave(&state.database) {
        Ok(Some((trigger, summary))) => tracing::debug!(
            trigger = trigger.as_str(),
            series = summary.series,
            points = summary.points,
            "autosave completed"
        ),
        Ok(None) => {}
        Err(error) => tracing::error!(%error, "autosave after mutation failed"),
    }
}
