//! Game sessions on top of a [`ConnectionEngine`](client::ConnectionEngine).
//!
//! - [`registry`]: room tag lookup with wait-until-created
//! - [`admission`]: concurrent-game slots and the batch drain barrier
//! - [`player`]: routes connection events, plays moves, runs invite batches

pub mod accept;
pub mod admission;
pub mod config;
pub mod error;
pub mod game;
pub mod player;
pub mod registry;

pub use chessbot_client as client;
pub use chessbot_protocol as protocol;
pub use chessbot_rules as rules;
pub use chessbot_types as types;

pub use accept::{AcceptPolicy, PendingInvite};
pub use admission::{AdmissionController, AdmissionSlot};
pub use config::PlayerConfig;
pub use error::{AdmissionError, SessionError};
pub use game::{GameSession, SharedGame};
pub use player::Player;
pub use registry::GameRegistry;
