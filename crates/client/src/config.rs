//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::types::{
    DEFAULT_HOST, DEFAULT_INVITE_TIMEOUT_MS, DEFAULT_PING_INTERVAL_MS, DEFAULT_PING_TIMEOUT_MS,
    DEFAULT_PORT, DEFAULT_USERNAME,
};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Account name sent with `setPlayerName` right after the handshake.
    pub username: String,
    /// Used until the server handshake supplies its own value.
    pub ping_interval_ms: u64,
    /// Used until the server handshake supplies its own value.
    pub ping_timeout_ms: u64,
    pub invite_timeout: Duration,
    /// Append every raw frame to this file.
    pub wire_log: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            ping_interval_ms: DEFAULT_PING_INTERVAL_MS,
            ping_timeout_ms: DEFAULT_PING_TIMEOUT_MS,
            invite_timeout: Duration::from_millis(DEFAULT_INVITE_TIMEOUT_MS),
            wire_log: None,
        }
    }
}

impl ClientConfig {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// Create from `CHESSBOT_*` environment variables.
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        use std::env;

        let defaults = Self::default();

        let host = env::var("CHESSBOT_HOST")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.host);
        let port = env::var("CHESSBOT_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);
        let username = env::var("CHESSBOT_USERNAME")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.username);
        let ping_interval_ms = env::var("CHESSBOT_PING_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.ping_interval_ms);
        let ping_timeout_ms = env::var("CHESSBOT_PING_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.ping_timeout_ms);
        let invite_timeout = env::var("CHESSBOT_INVITE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.invite_timeout);
        let wire_log = env::var("CHESSBOT_WIRE_LOG")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            host,
            port,
            username,
            ping_interval_ms,
            ping_timeout_ms,
            invite_timeout,
            wire_log,
        }
    }

    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Socket.IO v4 endpoint over a plain WebSocket.
    pub fn websocket_url(&self) -> String {
        format!(
            "ws://{}/socket.io/?EIO=4&transport=websocket",
            self.authority()
        )
    }

    pub fn origin(&self) -> String {
        format!("http://{}", self.authority())
    }
}
