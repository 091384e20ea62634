//! Chess bot runner (default binary).
//!
//! Connects with the `CHESSBOT_*` environment configuration and plays random
//! legal moves. With `CHESSBOT_OPPONENT` set it invites that player
//! `CHESSBOT_GAMES` times; otherwise it accepts that many invitations.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use chessbot::client::{ClientConfig, ConnectionEngine};
use chessbot::rules::{RandomPolicy, ShakmatyRules};
use chessbot::session::{AcceptPolicy, Player, PlayerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client_config = ClientConfig::from_env();
    let player_config = PlayerConfig::from_env();
    let opponent = std::env::var("CHESSBOT_OPPONENT")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let games: usize = match std::env::var("CHESSBOT_GAMES") {
        Ok(s) => s
            .trim()
            .parse()
            .with_context(|| format!("CHESSBOT_GAMES is not a count: {s:?}"))?,
        Err(_) => 1,
    };

    info!(
        server = %client_config.authority(),
        username = %client_config.username,
        max_games = player_config.max_concurrent_games,
        "starting"
    );

    let (engine, events) = ConnectionEngine::new(client_config);
    let player = Arc::new(Player::new(
        engine.clone(),
        Arc::new(ShakmatyRules::new()),
        Arc::new(RandomPolicy::new()),
        player_config,
    ));
    let session = tokio::spawn(Arc::clone(&player).run(events));

    engine.connect().await.context("failed to connect")?;
    if !engine.logged_in().await {
        bail!("connection closed before login");
    }
    let login = engine.login_state().await;
    if let Some(name) = login.name_mismatch() {
        info!(requested = %login.username, confirmed = %name, "playing under a server-assigned name");
    }

    let played = tokio::select! {
        played = async {
            match &opponent {
                Some(name) => player.send_invites(name, games).await,
                None => player.accept_invites(&AcceptPolicy::Any, games).await,
            }
        } => played?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            0
        }
    };
    info!(games = played, "done");

    engine.disconnect().await;
    let _ = session.await;
    Ok(())
}
