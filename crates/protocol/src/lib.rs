//! Wire protocol for the chess game server.
//!
//! The server speaks Socket.IO v4 over a text message stream:
//!
//! 1. **Handshake**: server sends `0{"sid":...,"pingInterval":...,"pingTimeout":...}`
//! 2. **Namespace open**: client answers `40`
//! 3. **Events**: both sides exchange `42["eventName", payload]`
//! 4. **Keepalive**: server sends `2`, client answers `3`
//!
//! ```text
//! Server -> Client: 0{"sid":"abc","pingInterval":25000,"pingTimeout":20000}
//! Client -> Server: 40
//! Client -> Server: 42["setPlayerName","Bot1"]
//! Server -> Client: 42["playerNameSet",{"socketId":"...","name":"Bot1"}]
//! Client -> Server: 42["invitePlayer",{"invitee":"Foe"}]
//! Server -> Client: 42["invitationSent",{"roomId":"room1"}]
//! Server -> Client: 42["gameStart",{"id":"room1","white":"Bot1","black":"Foe","gameFen":"..."}]
//! Client -> Server: 42["move",{"roomId":"room1","move":"e4"}]
//! Server -> Client: 2
//! Client -> Server: 3
//! ```
//!
//! - See [`frame`] for the codec
//! - See [`event`] for typed inbound and outbound events

pub mod error;
pub mod event;
pub mod frame;

pub use chessbot_types as types;

pub use error::ProtocolError;
pub use event::{ClientEvent, EventKind, ServerEvent};
pub use frame::{decode, encode, EventFrame, Frame, Handshake};
