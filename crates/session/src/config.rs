use std::time::Duration;

use crate::rules::MoveNotation;
use crate::types::{DEFAULT_GAME_LOOKUP_TIMEOUT_MS, DEFAULT_MAX_CONCURRENT_GAMES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    pub max_concurrent_games: usize,
    /// Send `startGame` as soon as an invite is accepted or an opponent joins.
    pub auto_start: bool,
    pub notation: MoveNotation,
    /// How long a position update waits for its game to be created.
    pub game_lookup_timeout: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_games: DEFAULT_MAX_CONCURRENT_GAMES,
            auto_start: true,
            notation: MoveNotation::default(),
            game_lookup_timeout: Duration::from_millis(DEFAULT_GAME_LOOKUP_TIMEOUT_MS),
        }
    }
}

impl PlayerConfig {
    /// Create from `CHESSBOT_MAX_GAMES`, `CHESSBOT_AUTOSTART` and
    /// `CHESSBOT_MOVE_NOTATION`.
    pub fn from_env() -> Self {
        use std::env;

        let defaults = Self::default();

        let max_concurrent_games = env::var("CHESSBOT_MAX_GAMES")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.max_concurrent_games);
        let auto_start = env::var("CHESSBOT_AUTOSTART")
            .ok()
            .and_then(|s| parse_flag(&s))
            .unwrap_or(defaults.auto_start);
        let notation = env::var("CHESSBOT_MOVE_NOTATION")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.notation);

        Self {
            max_concurrent_games,
            auto_start,
            notation,
            ..defaults
        }
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.max_concurrent_games, 1);
        assert!(config.auto_start);
        assert_eq!(config.notation, MoveNotation::San);
        assert_eq!(config.game_lookup_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_player_config_from_env() {
        let _config = PlayerConfig::from_env();
    }
}
