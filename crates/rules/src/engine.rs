//! Rules engine seam.
//!
//! The session layer never looks inside a position encoding. It asks a
//! [`RulesEngine`] whose turn it is and which moves are legal, then sends one
//! of the returned moves back in the notation the server expects.

use std::fmt;
use std::str::FromStr;

use arrayvec::ArrayVec;
use thiserror::Error;

use crate::types::Color;

/// Upper bound on legal moves in any chess position (the known maximum is 218).
pub const MAX_LEGAL_MOVES: usize = 256;

pub type MoveList = ArrayVec<CandidateMove, MAX_LEGAL_MOVES>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RulesError {
    #[error("invalid position {position:?}: {reason}")]
    InvalidPosition { position: String, reason: String },
}

impl RulesError {
    pub fn invalid(position: &str, reason: impl fmt::Display) -> Self {
        RulesError::InvalidPosition {
            position: position.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Move string format sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MoveNotation {
    /// Standard algebraic notation (`Nf3`, `exd5`, `O-O`, `e8=Q+`).
    #[default]
    San,
    /// Long algebraic UCI notation (`g1f3`, `e7e8q`).
    Uci,
}

impl FromStr for MoveNotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("san") {
            Ok(MoveNotation::San)
        } else if s.eq_ignore_ascii_case("uci") {
            Ok(MoveNotation::Uci)
        } else {
            Err(format!("unknown move notation: {s}"))
        }
    }
}

/// One legal move, pre-serialized in both notations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateMove {
    pub uci: String,
    pub san: String,
}

impl CandidateMove {
    pub fn new(uci: impl Into<String>, san: impl Into<String>) -> Self {
        Self {
            uci: uci.into(),
            san: san.into(),
        }
    }

    pub fn serialize(&self, notation: MoveNotation) -> &str {
        match notation {
            MoveNotation::San => &self.san,
            MoveNotation::Uci => &self.uci,
        }
    }
}

pub trait RulesEngine: Send + Sync {
    fn side_to_move(&self, position: &str) -> Result<Color, RulesError>;

    /// All legal moves. Empty means the game is over for the side to move.
    fn legal_moves(&self, position: &str) -> Result<MoveList, RulesError>;
}
