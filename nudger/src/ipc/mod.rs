//! Health surface over a Unix Domain Socket
//!
//! Newline-delimited JSON: the CLI connects, sends one message and reads one
//! response. Used by `nudger health` and `nudger stop`.

use std::path::PathBuf;

pub mod client;
pub mod listener;
pub mod messages;

pub use client::{HealthClient, HealthReport};
pub use listener::HealthServer;
pub use messages::{HealthMessage, HealthResponse};

use crate::config::HealthConfig;

/// Maximum message size in bytes
pub(crate) const MAX_MESSAGE_SIZE: usize = 1024;

/// Socket path: configured path, else the runtime dir, data dir or /tmp
pub fn get_socket_path(config: &HealthConfig) -> PathBuf {
    if let Some(path) = &config.socket_path {
        return PathBuf::from(path);
    }
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("nudger")
        .join("nudger.sock")
}
