//! Frame codec for the Socket.IO v4 text framing.
//!
//! Every wire message starts with a short numeric prefix selecting the frame
//! kind. Decoding is a pure prefix match; nothing here touches I/O.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::types::{DEFAULT_PING_INTERVAL_MS, DEFAULT_PING_TIMEOUT_MS};

pub const HANDSHAKE_PREFIX: &str = "0";
pub const CLOSE_PREFIX: &str = "1";
pub const PING_PREFIX: &str = "2";
pub const PONG_PREFIX: &str = "3";
pub const OPEN_PREFIX: &str = "40";
pub const DISCONNECT_PREFIX: &str = "41";
pub const EVENT_PREFIX: &str = "42";

/// Server handshake payload (`0{...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub sid: String,
    #[serde(rename = "pingInterval", default = "default_ping_interval")]
    pub ping_interval_ms: u64,
    #[serde(rename = "pingTimeout", default = "default_ping_timeout")]
    pub ping_timeout_ms: u64,
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}

fn default_ping_timeout() -> u64 {
    DEFAULT_PING_TIMEOUT_MS
}

/// Named event with an optional payload (`42["name", payload]`).
#[derive(Debug, Clone, PartialEq)]
pub struct EventFrame {
    pub name: String,
    pub payload: Option<Value>,
}

impl EventFrame {
    pub fn new(name: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Handshake(Handshake),
    /// Namespace open. Outbound this is the client's open-ack.
    Open,
    /// Server closed the namespace (`41`) or the whole session (`1`).
    Disconnect,
    Event(EventFrame),
    Ping,
    Pong,
}

impl Frame {
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Handshake(_) => "handshake",
            Frame::Open => "open",
            Frame::Disconnect => "disconnect",
            Frame::Event(_) => "event",
            Frame::Ping => "ping",
            Frame::Pong => "pong",
        }
    }
}

/// Decode one raw text message.
pub fn decode(raw: &str) -> Result<Frame, ProtocolError> {
    let raw = raw.trim_end_matches(['\r', '\n']);
    if raw.is_empty() {
        return Err(ProtocolError::Empty);
    }

    if let Some(body) = raw.strip_prefix(EVENT_PREFIX) {
        return decode_event(body).map(Frame::Event);
    }
    if raw.starts_with(OPEN_PREFIX) {
        // The server may append `{"sid":...}`; nothing in it is needed.
        return Ok(Frame::Open);
    }
    if raw.starts_with(DISCONNECT_PREFIX) {
        return Ok(Frame::Disconnect);
    }
    if let Some(body) = raw.strip_prefix(HANDSHAKE_PREFIX) {
        let hs: Handshake = serde_json::from_str(body).map_err(ProtocolError::Handshake)?;
        return Ok(Frame::Handshake(hs));
    }
    if raw == CLOSE_PREFIX {
        return Ok(Frame::Disconnect);
    }
    // Probe payloads ("2probe") are still pings.
    if raw.starts_with(PING_PREFIX) {
        return Ok(Frame::Ping);
    }
    if raw.starts_with(PONG_PREFIX) {
        return Ok(Frame::Pong);
    }

    Err(ProtocolError::unknown(raw))
}

fn decode_event(body: &str) -> Result<EventFrame, ProtocolError> {
    let items: Vec<Value> = serde_json::from_str(body)
        .map_err(|e| ProtocolError::MalformedEvent(format!("not a JSON array: {e}")))?;

    let mut items = items.into_iter();
    let name = match items.next() {
        Some(Value::String(name)) => name,
        Some(other) => {
            return Err(ProtocolError::MalformedEvent(format!(
                "event name must be a string, got {other}"
            )))
        }
        None => return Err(ProtocolError::MalformedEvent("empty event array".to_string())),
    };
    let payload = items.next();
    if items.next().is_some() {
        return Err(ProtocolError::MalformedEvent(format!(
            "event {name:?} carries more than one payload"
        )));
    }

    Ok(EventFrame { name, payload })
}

/// Encode one frame to its wire text.
pub fn encode(frame: &Frame) -> String {
    match frame {
        Frame::Handshake(hs) => {
            let mut out = String::from(HANDSHAKE_PREFIX);
            // A struct of strings and integers always serializes.
            out.push_str(&serde_json::to_string(hs).unwrap_or_default());
            out
        }
        Frame::Open => OPEN_PREFIX.to_string(),
        Frame::Disconnect => DISCONNECT_PREFIX.to_string(),
        Frame::Event(ev) => encode_event(ev),
        Frame::Ping => PING_PREFIX.to_string(),
        Frame::Pong => PONG_PREFIX.to_string(),
    }
}

fn encode_event(ev: &EventFrame) -> String {
    let body = match &ev.payload {
        Some(payload) => serde_json::to_string(&(&ev.name, payload)),
        None => serde_json::to_string(&(&ev.name,)),
    };
    let mut out = String::from(EVENT_PREFIX);
    out.push_str(&body.unwrap_or_default());
    out
}
