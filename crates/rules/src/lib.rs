//! Chess rules collaborator.
//!
//! - [`engine`]: the [`RulesEngine`] seam used by the session layer
//! - [`chess`]: shakmaty-backed implementation for FEN positions
//! - [`policy`]: how one legal move is picked

pub mod chess;
pub mod engine;
pub mod policy;

pub use chessbot_types as types;

pub use chess::ShakmatyRules;
pub use engine::{CandidateMove, MoveList, MoveNotation, RulesEngine, RulesError, MAX_LEGAL_MOVES};
pub use policy::{FirstLegalPolicy, MovePolicy, RandomPolicy};
