//! Core types module - shared data structures and constants
//!
//! Pure data definitions shared by the protocol codec, the connection engine,
//! the rules adapter and the session layer. No external dependencies.
//!
//! # Connection lifecycle
//!
//! ```text
//! Disconnected -> Connecting -> HandshakeWait -> Open -> LoggedIn
//!        \            \              \            \        \
//!         +------------+--------------+------------+--------+--> Closing -> Closed
//! ```
//!
//! # Defaults
//!
//! | Constant | Value | Description |
//! |----------|-------|-------------|
//! | `DEFAULT_HOST` | `localhost` | Game server host |
//! | `DEFAULT_PORT` | 3001 | Game server port |
//! | `DEFAULT_PING_INTERVAL_MS` | 25000 | Used when the handshake omits `pingInterval` |
//! | `DEFAULT_PING_TIMEOUT_MS` | 20000 | Used when the handshake omits `pingTimeout` |
//! | `DEFAULT_INVITE_TIMEOUT_MS` | 5000 | Wait for an invitation response |
//! | `DEFAULT_MAX_CONCURRENT_GAMES` | 1 | Admission capacity |

use std::fmt;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_USERNAME: &str = "chessbot";
pub const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;
pub const DEFAULT_PING_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_INVITE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_CONCURRENT_GAMES: usize = 1;
pub const DEFAULT_GAME_LOOKUP_TIMEOUT_MS: u64 = 30_000;

/// Standard chess starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Side of the board. White moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// FEN side-to-move letter.
    pub fn as_char(self) -> char {
        match self {
            Color::White => 'w',
            Color::Black => 'b',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'w' | 'W' => Some(Color::White),
            'b' | 'B' => Some(Color::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => f.write_str("white"),
            Color::Black => f.write_str("black"),
        }
    }
}

/// Lifecycle of one game session as seen by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameStatus {
    #[default]
    Waiting,
    Playing,
    Finished,
}

impl GameStatus {
    /// Map a server status string.
    ///
    /// The server reports `waiting`, `playing` and `ended`; `finished` and
    /// `over` are accepted as synonyms of the terminal state. Anything else is
    /// `None`.
    pub fn from_wire(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("waiting") {
            Some(GameStatus::Waiting)
        } else if s.eq_ignore_ascii_case("playing") {
            Some(GameStatus::Playing)
        } else if s.eq_ignore_ascii_case("ended")
            || s.eq_ignore_ascii_case("finished")
            || s.eq_ignore_ascii_case("over")
        {
            Some(GameStatus::Finished)
        } else {
            None
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, GameStatus::Finished)
    }
}

/// Connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    HandshakeWait,
    Open,
    LoggedIn,
    Closing,
    Closed,
}

impl ConnectionState {
    pub const ALL: [ConnectionState; 7] = [
        ConnectionState::Disconnected,
        ConnectionState::Connecting,
        ConnectionState::HandshakeWait,
        ConnectionState::Open,
        ConnectionState::LoggedIn,
        ConnectionState::Closing,
        ConnectionState::Closed,
    ];

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Disconnected, Connecting) => true,
            (Connecting, HandshakeWait) => true,
            (HandshakeWait, Open) => true,
            (Open, LoggedIn) => true,
            (Closing, Closed) => true,
            (Closing, _) | (Closed, _) => false,
            (_, Closing) => true,
            _ => false,
        }
    }

    /// Sends are only allowed once the socket is up.
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            ConnectionState::HandshakeWait | ConnectionState::Open | ConnectionState::LoggedIn
        )
    }

    /// Namespace opened (logged in or not).
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::LoggedIn)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closing | ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::HandshakeWait => "handshake-wait",
            ConnectionState::Open => "open",
            ConnectionState::LoggedIn => "logged-in",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}
