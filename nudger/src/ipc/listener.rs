//! IPC listener for the running companion

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::MAX_MESSAGE_SIZE;
use super::messages::{HealthMessage, HealthResponse};
use crate::scheduler::Scheduler;

/// Time a client gets to send its message
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Bind a listener, creating the parent dir and removing a stale socket
pub fn create_listener_at(socket_path: &Path) -> Result<UnixListener> {
    debug!(?socket_path, "create_listener_at: creating IPC socket");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener_at: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind IPC socket")?;
    debug!(?socket_path, "create_listener_at: socket bound");
    Ok(listener)
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Read one newline-terminated message
pub async fn read_message(stream: &mut UnixStream) -> Result<HealthMessage> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    let bytes_read = reader
        .read_line(&mut line)
        .await
        .context("Failed to read IPC message")?;

    if bytes_read > MAX_MESSAGE_SIZE {
        return Err(eyre::eyre!("Message too large: {} bytes", bytes_read));
    }
    if line.is_empty() {
        return Err(eyre::eyre!("Empty message received"));
    }

    let msg: HealthMessage = serde_json::from_str(line.trim()).context("Failed to parse IPC message")?;
    debug!(?msg, "read_message: parsed message");
    Ok(msg)
}

/// Write one response line
pub async fn send_response(stream: &mut UnixStream, response: &HealthResponse) -> Result<()> {
    let response_json = serde_json::to_string(response).context("Failed to serialize response")?;
    stream
        .write_all(response_json.as_bytes())
        .await
        .context("Failed to write response")?;
    stream.write_all(b"\n").await.context("Failed to write newline")?;
    stream.flush().await.context("Failed to flush response")?;
    debug!(?response, "send_response: sent response");
    Ok(())
}

/// Answers health requests until shutdown
pub struct HealthServer {
    listener: UnixListener,
    socket_path: PathBuf,
    scheduler: Scheduler,
    shutdown: Arc<watch::Sender<bool>>,
}

impl HealthServer {
    pub fn bind(socket_path: PathBuf, scheduler: Scheduler, shutdown: Arc<watch::Sender<bool>>) -> Result<Self> {
        let listener = create_listener_at(&socket_path)?;
        info!(socket = %socket_path.display(), "Health socket listening");
        Ok(Self {
            listener,
            socket_path,
            scheduler,
            shutdown,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Response for one message. `Shutdown` also raises the shutdown flag.
    pub async fn respond(&self, msg: HealthMessage) -> HealthResponse {
        match msg {
            HealthMessage::Ping => HealthResponse::Pong {
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            HealthMessage::Health => {
                let status = self.scheduler.status(Local::now().naive_local()).await;
                HealthResponse::Health {
                    status: if status.enabled { "ok" } else { "paused" }.to_string(),
                    current_phase: status.current_phase,
                    interrupted: status.interrupted,
                }
            }
            HealthMessage::Shutdown => {
                info!("Shutdown requested over IPC");
                let _ = self.shutdown.send(true);
                HealthResponse::Ok
            }
        }
    }

    async fn handle(&self, mut stream: UnixStream) {
        let response = match tokio::time::timeout(READ_TIMEOUT, read_message(&mut stream)).await {
            Ok(Ok(msg)) => self.respond(msg).await,
            Ok(Err(e)) => {
                warn!(error = %e, "Bad IPC message");
                HealthResponse::Error { message: e.to_string() }
            }
            Err(_) => {
                warn!("IPC client timed out");
                return;
            }
        };
        if let Err(e) = send_response(&mut stream, &response).await {
            warn!(error = %e, "Failed to send IPC response");
        }
    }

    /// Accept connections until the shutdown flag is raised
    pub async fn run(self) {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => self.handle(stream).await,
                    Err(e) => warn!(error = %e, "Failed to accept IPC connection"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        cleanup_socket(&self.socket_path);
        info!("Health socket closed");
    }
}
