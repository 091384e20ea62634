use thiserror::Error;

/// Longest raw excerpt kept inside an error.
const EXCERPT_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,

    #[error("unknown frame: {0:?}")]
    UnknownFrame(String),

    #[error("malformed handshake: {0}")]
    Handshake(#[source] serde_json::Error),

    #[error("malformed event frame: {0}")]
    MalformedEvent(String),

    #[error("invalid {event} payload: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ProtocolError {
    /// A handshake we cannot read leaves the connection unusable; everything
    /// else is logged and the frame dropped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::Handshake(_))
    }

    pub(crate) fn unknown(raw: &str) -> Self {
        ProtocolError::UnknownFrame(excerpt(raw).to_string())
    }
}

pub(crate) fn excerpt(raw: &str) -> &str {
    if raw.len() <= EXCERPT_LEN {
        return raw;
    }
    let mut end = EXCERPT_LEN;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    &raw[..end]
}
