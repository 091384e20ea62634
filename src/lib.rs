//! Chess bot client (workspace facade crate).
//!
//! Re-exports the implementation crates under `crates/` as
//! `chessbot::{types, protocol, rules, client, session}`.

pub use chessbot_client as client;
pub use chessbot_protocol as protocol;
pub use chessbot_rules as rules;
pub use chessbot_session as session;
pub use chessbot_types as types;
