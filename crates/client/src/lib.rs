//! Socket.IO client for the chess game server.
//!
//! [`ConnectionEngine`] drives one connection: it answers the handshake and
//! keepalive pings, logs in, correlates invite replies and forwards everything
//! game-related as [`SessionEvent`]s.
//!
//! ```no_run
//! use chessbot_client::{ClientConfig, ConnectionEngine};
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), chessbot_client::ClientError> {
//! let (engine, mut events) = ConnectionEngine::new(ClientConfig::new("Bot1"));
//! engine.connect().await?;
//! engine.wait_for_login(Duration::from_secs(5)).await;
//! engine.invite("Foe").await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod pending;
pub mod transport;
pub mod wire_log;

pub use chessbot_protocol as protocol;
pub use chessbot_types as types;

pub use config::ClientConfig;
pub use connection::{
    ConnectionEngine, ConnectionSnapshot, InviteOutcome, InviteReply, LoginState, SessionEvent,
    WaitOutcome,
};
pub use error::ClientError;
pub use transport::{FrameReader, FrameWriter, LineTransport, Transport, WsTransport};
