//! IPC client used by the CLI

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::MAX_MESSAGE_SIZE;
use super::messages::{HealthMessage, HealthResponse};
use crate::domain::Phase;

/// Default timeout for IPC operations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Health report from a running companion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub status: String,
    pub current_phase: Phase,
    pub interrupted: bool,
}

/// Talks to a running companion over its socket
#[derive(Debug, Clone)]
pub struct HealthClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl HealthClient {
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Version of the running companion
    pub async fn ping(&self) -> Result<String> {
        debug!("HealthClient: ping");
        match self.send_message(HealthMessage::Ping).await? {
            HealthResponse::Pong { version } => Ok(version),
            HealthResponse::Error { message } => Err(eyre::eyre!("Companion error: {}", message)),
            _ => Err(eyre::eyre!("Unexpected response")),
        }
    }

    pub async fn health(&self) -> Result<HealthReport> {
        debug!("HealthClient: health");
        match self.send_message(HealthMessage::Health).await? {
            HealthResponse::Health {
                status,
                current_phase,
                interrupted,
            } => Ok(HealthReport {
                status,
                current_phase,
                interrupted,
            }),
            HealthResponse::Error { message } => Err(eyre::eyre!("Companion error: {}", message)),
            _ => Err(eyre::eyre!("Unexpected response")),
        }
    }

    /// Ask the companion to stop gracefully
    pub async fn shutdown(&self) -> Result<()> {
        debug!("HealthClient: shutdown");
        match self.send_message(HealthMessage::Shutdown).await? {
            HealthResponse::Ok => Ok(()),
            HealthResponse::Error { message } => Err(eyre::eyre!("Companion error: {}", message)),
            _ => Err(eyre::eyre!("Unexpected response")),
        }
    }

    async fn send_message(&self, msg: HealthMessage) -> Result<HealthResponse> {
        debug!(?self.socket_path, ?msg, "HealthClient: sending message");
        let mut stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to companion socket")?;

        let msg_json = serde_json::to_string(&msg).context("Failed to serialize message")?;
        if msg_json.len() > MAX_MESSAGE_SIZE {
            return Err(eyre::eyre!("Message too large: {} bytes", msg_json.len()));
        }

        tokio::time::timeout(self.timeout, async {
            stream
                .write_all(msg_json.as_bytes())
                .await
                .context("Failed to write message")?;
            stream.write_all(b"\n").await.context("Failed to write newline")?;
            stream.flush().await.context("Failed to flush stream")?;
            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Write timeout")??;

        let mut reader = BufReader::new(&mut stream);
        let mut line = String::new();
        tokio::time::timeout(self.timeout, async {
            let bytes_read = reader.read_line(&mut line).await.context("Failed to read response")?;
            if bytes_read > MAX_MESSAGE_SIZE {
                return Err(eyre::eyre!("Response too large: {} bytes", bytes_read));
            }
            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Read timeout")??;

        let response: HealthResponse = serde_json::from_str(line.trim()).context("Failed to parse response")?;
        debug!(?response, "HealthClient: received response");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_client_with_timeout() {
        let client = HealthClient::with_socket_path(PathBuf::from("/tmp/x.sock")).with_timeout(Duration::from_secs(10));
        assert_eq!(client.timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_socket_is_an_error() {
        let temp = TempDir::new().unwrap();
        let client = HealthClient::with_socket_path(temp.path().join("nonexistent.sock"));
        assert!(!client.socket_exists());
        assert!(client.ping().await.is_err());
    }
}
