//! Typed game-server events.
//!
//! Inbound event names map through [`INBOUND_EVENTS`] onto a closed
//! [`EventKind`]; names outside the table decode to
//! [`ServerEvent::Unrecognized`] so callers match on it explicitly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::frame::{EventFrame, Frame};
use crate::types::{GameStatus, START_FEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PlayerNameSet,
    InvitationSent,
    InvitationError,
    Invitation,
    InviteAccepted,
    PlayerJoined,
    GameStart,
    GameState,
}

/// Wire name -> kind. Several names may map to one kind.
pub const INBOUND_EVENTS: &[(&str, EventKind)] = &[
    ("playerNameSet", EventKind::PlayerNameSet),
    ("invitationSent", EventKind::InvitationSent),
    ("invitationError", EventKind::InvitationError),
    ("invitation", EventKind::Invitation),
    ("inviteAccepted", EventKind::InviteAccepted),
    ("playerJoined", EventKind::PlayerJoined),
    ("gameStart", EventKind::GameStart),
    ("gameStarted", EventKind::GameStart),
    ("gameState", EventKind::GameState),
];

impl EventKind {
    pub fn from_name(name: &str) -> Option<Self> {
        INBOUND_EVENTS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| *kind)
    }

    /// Canonical wire name.
    pub fn wire_name(self) -> &'static str {
        match self {
            EventKind::PlayerNameSet => "playerNameSet",
            EventKind::InvitationSent => "invitationSent",
            EventKind::InvitationError => "invitationError",
            EventKind::Invitation => "invitation",
            EventKind::InviteAccepted => "inviteAccepted",
            EventKind::PlayerJoined => "playerJoined",
            EventKind::GameStart => "gameStart",
            EventKind::GameState => "gameState",
        }
    }
}

// ============== Server -> Client payloads ==============

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlayerNameSet {
    pub name: String,
    #[serde(rename = "socketId", default)]
    pub socket_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvitationSent {
    #[serde(rename = "roomId", default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub invitee: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvitationError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Invitation {
    pub from: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
}

/// Payload of events that only identify a room.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoomRef {
    #[serde(rename = "roomId")]
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameStart {
    #[serde(alias = "roomId")]
    pub id: String,
    pub white: String,
    pub black: String,
    #[serde(rename = "gameFen", alias = "fen", default = "start_fen")]
    pub game_fen: String,
}

fn start_fen() -> String {
    START_FEN.to_string()
}

/// Position broadcast for one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameStateUpdate {
    pub room: String,
    pub fen: String,
    pub status: Option<GameStatus>,
    pub history: Vec<String>,
}

/// The server has used `room`, `id` and `roomId` for the tag; first one wins.
#[derive(Deserialize)]
struct RawGameState {
    #[serde(default)]
    room: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "roomId", default)]
    room_id: Option<String>,
    fen: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    history: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    PlayerNameSet(PlayerNameSet),
    InvitationSent(InvitationSent),
    InvitationError(InvitationError),
    Invitation(Invitation),
    InviteAccepted(RoomRef),
    PlayerJoined(RoomRef),
    GameStart(GameStart),
    GameState(GameStateUpdate),
    Unrecognized { name: String, payload: Option<Value> },
}

impl ServerEvent {
    pub fn from_frame(frame: EventFrame) -> Result<Self, ProtocolError> {
        let Some(kind) = EventKind::from_name(&frame.name) else {
            return Ok(ServerEvent::Unrecognized {
                name: frame.name,
                payload: frame.payload,
            });
        };
        let payload = frame.payload.unwrap_or(Value::Null);
        let event = match kind {
            EventKind::PlayerNameSet => ServerEvent::PlayerNameSet(parse(kind, payload)?),
            EventKind::InvitationSent => ServerEvent::InvitationSent(parse(kind, payload)?),
            EventKind::InvitationError => {
                // Some server builds send the bare message string.
                let err = match payload {
                    Value::String(message) => InvitationError { message },
                    Value::Null => InvitationError {
                        message: String::new(),
                    },
                    other => parse(kind, other)?,
                };
                ServerEvent::InvitationError(err)
            }
            EventKind::Invitation => ServerEvent::Invitation(parse(kind, payload)?),
            EventKind::InviteAccepted => ServerEvent::InviteAccepted(parse(kind, payload)?),
            EventKind::PlayerJoined => ServerEvent::PlayerJoined(parse(kind, payload)?),
            EventKind::GameStart => ServerEvent::GameStart(parse(kind, payload)?),
            EventKind::GameState => {
                let raw: RawGameState = parse(kind, payload)?;
                let room = raw
                    .room
                    .or(raw.id)
                    .or(raw.room_id)
                    .ok_or_else(|| {
                        ProtocolError::MalformedEvent("gameState without room tag".to_string())
                    })?;
                ServerEvent::GameState(GameStateUpdate {
                    room,
                    fen: raw.fen,
                    status: raw.status.as_deref().and_then(GameStatus::from_wire),
                    history: raw.history,
                })
            }
        };
        Ok(event)
    }

    pub fn kind(&self) -> Option<EventKind> {
        Some(match self {
            ServerEvent::PlayerNameSet(_) => EventKind::PlayerNameSet,
            ServerEvent::InvitationSent(_) => EventKind::InvitationSent,
            ServerEvent::InvitationError(_) => EventKind::InvitationError,
            ServerEvent::Invitation(_) => EventKind::Invitation,
            ServerEvent::InviteAccepted(_) => EventKind::InviteAccepted,
            ServerEvent::PlayerJoined(_) => EventKind::PlayerJoined,
            ServerEvent::GameStart(_) => EventKind::GameStart,
            ServerEvent::GameState(_) => EventKind::GameState,
            ServerEvent::Unrecognized { .. } => return None,
        })
    }
}

fn parse<T: for<'de> Deserialize<'de>>(kind: EventKind, payload: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|source| ProtocolError::Payload {
        event: kind.wire_name(),
        source,
    })
}

// ============== Client -> Server events ==============

#[derive(Serialize)]
struct InvitePayload<'a> {
    invitee: &'a str,
}

#[derive(Serialize)]
struct RoomPayload<'a> {
    #[serde(rename = "roomId")]
    room_id: &'a str,
}

#[derive(Serialize)]
struct MovePayload<'a> {
    #[serde(rename = "roomId")]
    room_id: &'a str,
    #[serde(rename = "move")]
    mv: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    SetPlayerName(String),
    InvitePlayer { invitee: String },
    AcceptInvitation { room_id: String },
    StartGame { room_id: String },
    Move { room_id: String, mv: String },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::SetPlayerName(_) => "setPlayerName",
            ClientEvent::InvitePlayer { .. } => "invitePlayer",
            ClientEvent::AcceptInvitation { .. } => "acceptInvitation",
            ClientEvent::StartGame { .. } => "startGame",
            ClientEvent::Move { .. } => "move",
        }
    }

    pub fn payload(&self) -> Value {
        let value = match self {
            ClientEvent::SetPlayerName(name) => Ok(Value::String(name.clone())),
            ClientEvent::InvitePlayer { invitee } => serde_json::to_value(InvitePayload { invitee }),
            ClientEvent::AcceptInvitation { room_id } => {
                serde_json::to_value(RoomPayload { room_id })
            }
            ClientEvent::StartGame { room_id } => Ok(Value::String(room_id.clone())),
            ClientEvent::Move { room_id, mv } => serde_json::to_value(MovePayload { room_id, mv }),
        };
        // Borrowed-string structs cannot fail to serialize.
        value.unwrap_or(Value::Null)
    }

    pub fn into_frame(self) -> Frame {
        let payload = self.payload();
        Frame::Event(EventFrame::new(self.name(), Some(payload)))
    }
}
