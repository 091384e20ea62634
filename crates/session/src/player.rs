//! Session orchestrator: turns routed connection events into game actions.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::accept::{AcceptPolicy, PendingInvite};
use crate::admission::AdmissionController;
use crate::client::protocol::event::{GameStart, GameStateUpdate};
use crate::client::{ConnectionEngine, InviteOutcome, InviteReply, SessionEvent};
use crate::config::PlayerConfig;
use crate::error::SessionError;
use crate::game::{GameSession, SharedGame};
use crate::registry::GameRegistry;
use crate::rules::{MovePolicy, RulesEngine, RulesError};
use crate::types::GameStatus;

pub struct Player {
    engine: ConnectionEngine,
    registry: GameRegistry,
    admission: AdmissionController,
    rules: Arc<dyn RulesEngine>,
    policy: Arc<dyn MovePolicy>,
    config: PlayerConfig,
    invites_tx: mpsc::UnboundedSender<PendingInvite>,
    invites_rx: Mutex<mpsc::UnboundedReceiver<PendingInvite>>,
}

impl Player {
    pub fn new(
        engine: ConnectionEngine,
        rules: Arc<dyn RulesEngine>,
        policy: Arc<dyn MovePolicy>,
        config: PlayerConfig,
    ) -> Self {
        let (invites_tx, invites_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            registry: GameRegistry::new(),
            admission: AdmissionController::new(config.max_concurrent_games),
            rules,
            policy,
            config,
            invites_tx,
            invites_rx: Mutex::new(invites_rx),
        }
    }

    pub fn engine(&self) -> &ConnectionEngine {
        &self.engine
    }

    pub fn registry(&self) -> &GameRegistry {
        &self.registry
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Consume connection events until the connection closes.
    ///
    /// Each event is handled in its own task; closing cancels the ones still
    /// running and fails every registry and admission wait.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        let mut handlers = JoinSet::new();

        while let Some(event) = events.recv().await {
            while let Some(done) = handlers.try_join_next() {
                if let Err(e) = done {
                    if e.is_panic() {
                        error!(error = %e, "session handler panicked");
                    }
                }
            }

            if event == SessionEvent::Closed {
                break;
            }
            let player = Arc::clone(&self);
            handlers.spawn(async move {
                if let Err(e) = player.handle_event(event).await {
                    warn!(error = %e, "session event failed");
                }
            });
        }

        self.registry.close();
        self.admission.close();
        handlers.abort_all();
        while handlers.join_next().await.is_some() {}
        info!("session loop stopped");
    }

    pub async fn handle_event(&self, event: SessionEvent) -> Result<(), SessionError> {
        match event {
            SessionEvent::InvitationReceived { inviter, room_id } => {
                self.on_invitation(inviter, room_id).await;
                Ok(())
            }
            SessionEvent::InviteAccepted { room_id } | SessionEvent::PlayerJoined { room_id } => {
                self.on_room_ready(&room_id).await
            }
            SessionEvent::GameStarted(start) => self.on_game_start(start).await,
            SessionEvent::PositionUpdated(update) => self.on_position_update(update).await,
            SessionEvent::Closed => Ok(()),
        }
    }

    /// Name the server knows us by.
    async fn own_name(&self) -> String {
        let login = self.engine.login_state().await;
        login.confirmed.unwrap_or(login.username)
    }

    async fn on_invitation(&self, inviter: String, room_id: String) {
        if inviter == self.own_name().await {
            debug!(room_id = %room_id, "ignoring our own invitation");
            return;
        }
        info!(inviter = %inviter, room_id = %room_id, "queued invitation");
        let _ = self.invites_tx.send(PendingInvite { inviter, room_id });
    }

    async fn on_room_ready(&self, room_id: &str) -> Result<(), SessionError> {
        if !self.config.auto_start || self.registry.contains(room_id).await {
            return Ok(());
        }
        info!(room_id, "auto-starting game");
        self.engine.start_game(room_id).await?;
        Ok(())
    }

    async fn on_game_start(&self, start: GameStart) -> Result<(), SessionError> {
        if self.registry.contains(&start.id).await || self.registry.is_finished(&start.id).await {
            debug!(room_id = %start.id, "duplicate game start");
            return Ok(());
        }

        let side = self.rules.side_to_move(&start.game_fen)?;
        let slot = self.admission.acquire_slot().await?;
        let owner = self.own_name().await;
        let (color, opponent) = GameSession::color_for(&owner, &start.white, &start.black);

        // Built complete, slot parked, before any position update can see it.
        // If another start won the race, or the game finished while this one
        // waited for a slot, the unused slot drops with the closure.
        let created = self
            .registry
            .get_or_create(&start.id, || {
                self.admission.hold(&start.id, slot);
                GameSession::started(&start.id, &owner, opponent, color, &start.game_fen, side)
            })
            .await;
        match created {
            Ok((_, true)) => {}
            Ok((_, false)) => return Ok(()),
            Err(SessionError::AlreadyFinished { .. }) => {
                debug!(room_id = %start.id, "game start after the game ended");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        info!(
            room_id = %start.id,
            %color,
            white = %start.white,
            black = %start.black,
            "game started"
        );
        Ok(())
    }

    async fn on_position_update(&self, update: GameStateUpdate) -> Result<(), SessionError> {
        let found = self
            .registry
            .get_within(&update.room, self.config.game_lookup_timeout)
            .await;
        let game = match found {
            Ok(Some(game)) => game,
            Ok(None) => {
                warn!(room_id = %update.room, "position update for a game that never started");
                return Ok(());
            }
            Err(SessionError::AlreadyFinished { .. }) => {
                debug!(room_id = %update.room, "position update after the game ended");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let side = self.rules.side_to_move(&update.fen)?;
        let ended = update.status.is_some_and(GameStatus::is_finished);
        let playing = update.status == Some(GameStatus::Playing);

        let next_move = {
            let mut game = game.lock().await;
            if game.status().is_finished() {
                return Ok(());
            }
            game.update_position(update.fen.as_str(), side);
            if ended {
                game.finish();
                None
            } else if playing && game.is_our_turn() {
                self.choose_move(&game)?
            } else {
                None
            }
        };

        if ended {
            return self.finish_game(&update.room).await;
        }
        if let Some(mv) = next_move {
            info!(room_id = %update.room, mv = %mv, "playing move");
            self.engine.send_move(&update.room, &mv).await?;
            game.lock().await.record_move();
        }
        Ok(())
    }

    fn choose_move(&self, game: &GameSession) -> Result<Option<String>, RulesError> {
        let moves = self.rules.legal_moves(game.position())?;
        if moves.is_empty() {
            info!(room_id = game.tag(), "no legal moves");
            return Ok(None);
        }
        Ok(self
            .policy
            .choose(game.position(), &moves)
            .map(|m| m.serialize(self.config.notation).to_string()))
    }

    async fn finish_game(&self, room_id: &str) -> Result<(), SessionError> {
        // Retire the tag before the slot so a batch loop that binds it in
        // between sees the game as finished.
        let removed = self.registry.remove(room_id).await;
        self.admission.release_slot(room_id);
        let game = removed?;
        let game = game.lock().await;
        info!(
            room_id,
            color = ?game.color(),
            moves = game.moves_sent(),
            "game finished"
        );
        Ok(())
    }

    /// Wait until the launched game `room_id` has started, or already ended.
    async fn await_launched(&self, room_id: &str) -> Result<(), SessionError> {
        match self.registry.get_when_present(room_id).await {
            Ok(_) => Ok(()),
            Err(SessionError::AlreadyFinished { .. }) => {
                // Ended before it was bound, so its release did not count it.
                self.admission.untrack(room_id);
                Ok(())
            }
            Err(e) => {
                self.admission.untrack(room_id);
                Err(e)
            }
        }
    }

    /// Game handle for `room_id`, if registered.
    pub async fn game(&self, room_id: &str) -> Option<SharedGame> {
        self.registry.get(room_id).await
    }

    /// Invite `opponent` `n` times, one game at a time up to the admission
    /// limit, then wait for every started game to finish.
    ///
    /// Returns how many games started.
    pub async fn send_invites(&self, opponent: &str, n: usize) -> Result<usize, SessionError> {
        if !self.engine.logged_in().await {
            return Err(SessionError::Closed);
        }
        let started_at = Instant::now();
        let mut started = 0;

        for round in 0..n {
            self.admission.track_start().await?;
            let outcome = match self.engine.invite(opponent).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.admission.abandon_start();
                    return Err(e.into());
                }
            };
            match outcome {
                InviteOutcome::Reply(InviteReply::Sent {
                    room_id: Some(room_id),
                    ..
                }) => {
                    debug!(round, room_id = %room_id, "invite sent");
                    self.admission.bind_start(&room_id);
                    self.await_launched(&room_id).await?;
                    started += 1;
                }
                InviteOutcome::Reply(InviteReply::Sent { room_id: None, .. }) => {
                    warn!(round, opponent, "invite sent without a room id; not waiting for it");
                    self.admission.abandon_start();
                }
                InviteOutcome::Reply(InviteReply::Rejected { message }) => {
                    warn!(round, opponent, message = %message, "invite rejected");
                    self.admission.abandon_start();
                }
                InviteOutcome::TimedOut => {
                    warn!(round, opponent, "no answer to invite");
                    self.admission.abandon_start();
                }
                InviteOutcome::Closed => return Err(SessionError::Closed),
            }
        }

        self.admission.await_all_finished().await?;
        info!(
            games = started,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "invite batch finished"
        );
        Ok(started)
    }

    /// Accept `n` invitations matching `policy`, then wait for those games to finish.
    pub async fn accept_invites(
        &self,
        policy: &AcceptPolicy,
        n: usize,
    ) -> Result<usize, SessionError> {
        if !self.engine.logged_in().await {
            return Err(SessionError::Closed);
        }
        let mut invites = self.invites_rx.lock().await;
        let mut accepted = 0;

        while accepted < n {
            let invite = tokio::select! {
                invite = invites.recv() => invite.ok_or(SessionError::Closed)?,
                _ = self.engine.closed() => return Err(SessionError::Closed),
            };
            if !policy.accepts(&invite.inviter) {
                debug!(inviter = %invite.inviter, "skipping invitation");
                continue;
            }

            self.admission.track_start().await?;
            self.admission.bind_start(&invite.room_id);
            if let Err(e) = self.engine.accept_invitation(&invite.room_id).await {
                self.admission.untrack(&invite.room_id);
                return Err(e.into());
            }
            self.await_launched(&invite.room_id).await?;
            accepted += 1;
        }

        self.admission.await_all_finished().await?;
        info!(games = accepted, "accept batch finished");
        Ok(accepted)
    }
}
