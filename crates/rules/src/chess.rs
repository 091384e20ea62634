//! [`RulesEngine`] backed by shakmaty.

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Position};

use crate::engine::{CandidateMove, MoveList, RulesEngine, RulesError};
use crate::types::Color;

/// Standard chess from FEN positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShakmatyRules;

impl ShakmatyRules {
    pub fn new() -> Self {
        Self
    }

    fn position(&self, fen: &str) -> Result<Chess, RulesError> {
        let parsed: Fen = fen.trim().parse().map_err(|e| RulesError::invalid(fen, e))?;
        parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| RulesError::invalid(fen, e))
    }
}

impl RulesEngine for ShakmatyRules {
    fn side_to_move(&self, position: &str) -> Result<Color, RulesError> {
        Ok(match self.position(position)?.turn() {
            shakmaty::Color::White => Color::White,
            shakmaty::Color::Black => Color::Black,
        })
    }

    fn legal_moves(&self, position: &str) -> Result<MoveList, RulesError> {
        let pos = self.position(position)?;
        let mut out = MoveList::new();
        for m in pos.legal_moves() {
            let uci = UciMove::from_move(m, CastlingMode::Standard).to_string();
            let san = SanPlus::from_move(pos.clone(), m).to_string();
            // shakmaty's own move list has the same capacity.
            if out.try_push(CandidateMove { uci, san }).is_err() {
                break;
            }
        }
        Ok(out)
    }
}
