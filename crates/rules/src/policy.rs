//! Move selection policies.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

use crate::engine::CandidateMove;

/// Picks one move among the legal ones.
pub trait MovePolicy: Send + Sync {
    fn choose<'a>(&self, position: &str, moves: &'a [CandidateMove]) -> Option<&'a CandidateMove>;
}

/// Uniformly random legal move.
#[derive(Debug)]
pub struct RandomPolicy {
    rng: Mutex<StdRng>,
}

impl RandomPolicy {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic sequence for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl MovePolicy for RandomPolicy {
    fn choose<'a>(&self, _position: &str, moves: &'a [CandidateMove]) -> Option<&'a CandidateMove> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        moves.choose(&mut *rng)
    }
}

/// First move in generation order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstLegalPolicy;

impl MovePolicy for FirstLegalPolicy {
    fn choose<'a>(&self, _position: &str, moves: &'a [CandidateMove]) -> Option<&'a CandidateMove> {
        moves.first()
    }
}
