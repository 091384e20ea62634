use thiserror::Error;

use crate::client::ClientError;
use crate::rules::RulesError;
use crate::types::Color;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("admission controller closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session closed")]
    Closed,

    #[error("unknown game {tag}")]
    UnknownGame { tag: String },

    #[error("game {tag} is still running")]
    NotFinished { tag: String },

    #[error("game {tag} already finished")]
    AlreadyFinished { tag: String },

    #[error("game {tag} already assigned {current}, refusing {requested}")]
    ColorConflict {
        tag: String,
        current: Color,
        requested: Color,
    },

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Rules(#[from] RulesError),
}
