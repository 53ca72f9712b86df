use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::Instrument;

use crate::errors::ProtocolError;
use crate::handlers::handle_line;
use crate::models::Response;
use crate::state::AppState;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Accepts connections until `shutdown` resolves. Connections already being
/// served keep running on their own tasks.
pub(crate) async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("listener stopped");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => spawn_connection(stream, peer, &state),
                Err(error) => {
                    tracing::warn!(%error, "failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }
}

fn spawn_connection(stream: TcpStream, peer: SocketAddr, state: &AppState) {
    let permit = state.connections.clone().try_acquire_owned().ok();
    let state = state.clone();
    let span = tracing::info_span!("connection", %peer);

    tokio::spawn(
        async move {
            let Some(_permit) = permit else {
                reject(stream, state.config.max_connections).await;
                return;
            };
            tracing::debug!("connection opened");
            match handle_connection(stream, &state).await {
                Ok(()) => tracing::debug!("connection closed"),
                Err(error) => tracing::debug!(%error, "connection closed with error"),
            }
        }
        .instrument(span),
    );
}

async fn reject(mut stream: TcpStream, limit: usize) {
    tracing::warn!(limit, "connection limit reached");
    let response = Response::from(ProtocolError::too_many_connections(limit));
    if let Err(error) = stream.write_all(&response.to_line()).await {
        tracing::debug!(%error, "failed to notify rejected connection");
    }
    let _ = stream.shutdown().await;
}

/// Reads newline-terminated requests and answers each with exactly one line.
/// A line longer than the configured limit ends the connection. The limit
/// counts request bytes only; the `\r\n` or `\n` terminator is not included.
async fn handle_connection(stream: TcpStream, state: &AppState) -> io::Result<()> {
    let limit = state.config.max_line_bytes;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::with_capacity(1024);

    loop {
        buffer.clear();
        let read = (&mut reader)
            .take(limit as u64 + 2)
            .read_until(b'\n', &mut buffer)
            .await?;
        if read == 0 {
            return Ok(());
        }

        if buffer.last() == Some(&b'\n') {
            buffer.pop();
            if buffer.last() == Some(&b'\r') {
                buffer.pop();
            }
        }
        if buffer.len() > limit {
            let response = Response::from(ProtocolError::line_too_long(limit));
            writer.write_all(&response.to_line()).await?;
            writer.shutdown().await?;
            return Ok(());
        }

        let response = match std::str::from_utf8(&buffer) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(state, line).await,
            Err(_) => ProtocolError::invalid_argument("request line is not valid UTF-8").into(),
        };
        writer.write_all(&response.to_line()).await?;
    }
}
