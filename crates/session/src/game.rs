//! Per-room game state.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::SessionError;
use crate::types::{Color, GameStatus, START_FEN};

pub type SharedGame = Arc<Mutex<GameSession>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    tag: String,
    owner: String,
    opponent: Option<String>,
    color: Option<Color>,
    position: String,
    side_to_move: Color,
    status: GameStatus,
    moves_sent: u32,
}

impl GameSession {
    pub fn new(tag: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            owner: owner.into(),
            opponent: None,
            color: None,
            position: START_FEN.to_string(),
            side_to_move: Color::White,
            status: GameStatus::Waiting,
            moves_sent: 0,
        }
    }

    /// A game already in progress.
    pub fn started(
        tag: impl Into<String>,
        owner: impl Into<String>,
        opponent: impl Into<String>,
        color: Color,
        position: impl Into<String>,
        side_to_move: Color,
    ) -> Self {
        Self {
            opponent: Some(opponent.into()),
            color: Some(color),
            position: position.into(),
            side_to_move,
            status: GameStatus::Playing,
            ..Self::new(tag, owner)
        }
    }

    /// Our color given the room's player names: black only when listed as black.
    pub fn color_for(owner: &str, white: &str, black: &str) -> (Color, String) {
        if black == owner {
            (Color::Black, white.to_string())
        } else {
            (Color::White, black.to_string())
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn opponent(&self) -> Option<&str> {
        self.opponent.as_deref()
    }

    pub fn set_opponent(&mut self, opponent: impl Into<String>) {
        self.opponent = Some(opponent.into());
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    /// Colors are fixed once set; reassigning the same color is a no-op.
    pub fn assign_color(&mut self, color: Color) -> Result<(), SessionError> {
        match self.color {
            None => {
                self.color = Some(color);
                Ok(())
            }
            Some(current) if current == color => Ok(()),
            Some(current) => Err(SessionError::ColorConflict {
                tag: self.tag.clone(),
                current,
                requested: color,
            }),
        }
    }

    pub fn position(&self) -> &str {
        &self.position
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn update_position(&mut self, position: impl Into<String>, side_to_move: Color) {
        self.position = position.into();
        self.side_to_move = side_to_move;
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn start(&mut self) {
        if !self.status.is_finished() {
            self.status = GameStatus::Playing;
        }
    }

    pub fn finish(&mut self) {
        self.status = GameStatus::Finished;
    }

    pub fn is_our_turn(&self) -> bool {
        self.status == GameStatus::Playing && self.color == Some(self.side_to_move)
    }

    pub fn record_move(&mut self) {
        self.moves_sent += 1;
    }

    pub fn moves_sent(&self) -> u32 {
        self.moves_sent
    }
}
