use thiserror::Error;

use crate::protocol::ProtocolError;
use crate::types::ConnectionState;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not connected (state: {state})")]
    NotConnected { state: ConnectionState },

    #[error("not logged in (state: {state})")]
    NotLoggedIn { state: ConnectionState },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("invalid state transition {from} -> {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    #[error("invalid server address: {0}")]
    InvalidAddress(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
