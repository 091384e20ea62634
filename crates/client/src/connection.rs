//! Connection engine: owns the transport, the state machine and the read loop.
//!
//! The read loop spawns one handler task per decoded frame. Handlers share the
//! engine state through [`Shared`]; state transitions go through a single lock
//! and sends go through the writer lock, so concurrent handlers never interleave
//! partial writes or race a transition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex, Notify, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::pending::{PendingSlot, SlotOutcome};
use crate::protocol::event::{GameStart, GameStateUpdate};
use crate::protocol::{frame, ClientEvent, EventFrame, Frame, Handshake, ServerEvent};
use crate::transport::{FrameReader, FrameWriter, Transport, WsTransport};
use crate::types::ConnectionState;
use crate::wire_log::{spawn_wire_log, WireRecord};

/// Events forwarded to the session layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    InvitationReceived { inviter: String, room_id: String },
    InviteAccepted { room_id: String },
    PlayerJoined { room_id: String },
    GameStarted(GameStart),
    PositionUpdated(GameStateUpdate),
    /// Terminal; nothing follows.
    Closed,
}

/// Server answer to `invitePlayer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteReply {
    Sent {
        room_id: Option<String>,
        invitee: Option<String>,
        message: Option<String>,
    },
    Rejected {
        message: String,
    },
}

impl InviteReply {
    pub fn room_id(&self) -> Option<&str> {
        match self {
            InviteReply::Sent { room_id, .. } => room_id.as_deref(),
            InviteReply::Rejected { .. } => None,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, InviteReply::Sent { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteOutcome {
    Reply(InviteReply),
    TimedOut,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Reached,
    TimedOut,
    Closed,
}

impl WaitOutcome {
    pub fn is_reached(self) -> bool {
        matches!(self, WaitOutcome::Reached)
    }
}

/// Connection-level facts learned from the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub session_id: Option<String>,
    pub ping_interval_ms: u64,
    pub ping_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginState {
    /// Name this client logs in with.
    pub username: String,
    /// Name the server last confirmed.
    pub confirmed: Option<String>,
}

impl LoginState {
    pub fn is_logged_in(&self) -> bool {
        self.confirmed.is_some()
    }

    /// Confirmed name when the server assigned something else.
    pub fn name_mismatch(&self) -> Option<&str> {
        self.confirmed
            .as_deref()
            .filter(|confirmed| *confirmed != self.username)
    }
}

struct Shared {
    config: ClientConfig,
    connection: Mutex<ConnectionSnapshot>,
    state_tx: watch::Sender<ConnectionState>,
    login: RwLock<LoginState>,
    writer: Mutex<Option<Box<dyn FrameWriter>>>,
    invite_slot: PendingSlot<InviteReply>,
    invite_lock: Mutex<()>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    wire_log: OnceLock<mpsc::UnboundedSender<WireRecord>>,
    read_task: StdMutex<Option<JoinHandle<()>>>,
    shutdown: Notify,
    close_started: AtomicBool,
}

/// Cheap to clone; all clones drive the same connection.
#[derive(Clone)]
pub struct ConnectionEngine {
    shared: Arc<Shared>,
}

impl ConnectionEngine {
    pub fn new(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let shared = Shared {
            connection: Mutex::new(ConnectionSnapshot {
                state: ConnectionState::Disconnected,
                session_id: None,
                ping_interval_ms: config.ping_interval_ms,
                ping_timeout_ms: config.ping_timeout_ms,
            }),
            state_tx,
            login: RwLock::new(LoginState {
                username: config.username.clone(),
                confirmed: None,
            }),
            writer: Mutex::new(None),
            invite_slot: PendingSlot::new(),
            invite_lock: Mutex::new(()),
            events_tx,
            wire_log: OnceLock::new(),
            read_task: StdMutex::new(None),
            shutdown: Notify::new(),
            close_started: AtomicBool::new(false),
            config,
        };
        (
            Self {
                shared: Arc::new(shared),
            },
            events_rx,
        )
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub fn username(&self) -> &str {
        &self.shared.config.username
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Watch state changes. Intermediate states may be skipped by a slow reader.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub async fn connection(&self) -> ConnectionSnapshot {
        self.shared.connection.lock().await.clone()
    }

    pub async fn login_state(&self) -> LoginState {
        self.shared.login.read().await.clone()
    }

    /// Open the WebSocket to the configured server and start reading.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.shared.transition(ConnectionState::Connecting).await?;
        match WsTransport::connect(&self.shared.config).await {
            Ok(transport) => self.start(transport).await,
            Err(e) => {
                error!(error = %e, "connect failed");
                self.shared.finish_close("connect failed").await;
                Err(e)
            }
        }
    }

    /// Like [`connect`](Self::connect) over an already established transport.
    pub async fn connect_with<T: Transport>(&self, transport: T) -> Result<(), ClientError> {
        self.shared.transition(ConnectionState::Connecting).await?;
        self.start(transport).await
    }

    async fn start<T: Transport>(&self, transport: T) -> Result<(), ClientError> {
        let (reader, writer) = transport.split();
        *self.shared.writer.lock().await = Some(Box::new(writer));
        if let Some(path) = self.shared.config.wire_log.clone() {
            let _ = self.shared.wire_log.set(spawn_wire_log(path));
        }
        if let Err(e) = self.shared.transition(ConnectionState::HandshakeWait).await {
            // Closed while connecting; nobody else will release this writer.
            if let Some(mut writer) = self.shared.writer.lock().await.take() {
                if let Err(close_err) = writer.close().await {
                    debug!(error = %close_err, "transport close failed");
                }
            }
            return Err(e);
        }

        let handle = tokio::spawn(read_loop(Arc::clone(&self.shared), Box::new(reader)));
        if let Ok(mut slot) = self.shared.read_task.lock() {
            *slot = Some(handle);
        }
        info!(server = %self.shared.config.authority(), "connected, waiting for handshake");
        Ok(())
    }

    /// Send one raw frame.
    pub async fn send(&self, raw: &str) -> Result<(), ClientError> {
        self.shared.send_raw(raw).await
    }

    pub async fn emit(&self, event: ClientEvent) -> Result<(), ClientError> {
        self.shared.emit(event).await
    }

    /// Wait for the namespace to open, then announce `name`.
    ///
    /// The engine already logs in with the configured username after the
    /// handshake; this is for sending it again or under another name.
    pub async fn login(&self, name: &str) -> Result<(), ClientError> {
        match self.wait_until(ConnectionState::is_open, None).await {
            WaitOutcome::Reached => self.emit(ClientEvent::SetPlayerName(name.to_string())).await,
            _ => Err(ClientError::ConnectionClosed),
        }
    }

    pub async fn wait_for_connection(&self, timeout: Duration) -> WaitOutcome {
        self.wait_until(ConnectionState::is_open, Some(timeout)).await
    }

    pub async fn wait_for_login(&self, timeout: Duration) -> WaitOutcome {
        self.wait_until(|s| s == ConnectionState::LoggedIn, Some(timeout))
            .await
    }

    /// Wait for login without a deadline. False if the connection closed first.
    pub async fn logged_in(&self) -> bool {
        self.wait_until(|s| s == ConnectionState::LoggedIn, None)
            .await
            .is_reached()
    }

    /// Resolves once the connection has fully closed.
    pub async fn closed(&self) {
        let mut rx = self.shared.state_tx.subscribe();
        let _ = rx.wait_for(|s| *s == ConnectionState::Closed).await;
    }

    async fn wait_until(
        &self,
        reached: impl Fn(ConnectionState) -> bool,
        timeout: Option<Duration>,
    ) -> WaitOutcome {
        let mut rx = self.shared.state_tx.subscribe();
        let waiting = rx.wait_for(|s| reached(*s) || s.is_terminal());
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, waiting).await {
                Ok(result) => result,
                Err(_) => return WaitOutcome::TimedOut,
            },
            None => waiting.await,
        };
        match result {
            Ok(state) if reached(*state) => WaitOutcome::Reached,
            _ => WaitOutcome::Closed,
        }
    }

    /// Invite `name` and wait for the server's verdict.
    ///
    /// Calls are serialized; a reply that misses its deadline is discarded
    /// rather than handed to the next caller.
    pub async fn invite_opponent(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<InviteOutcome, ClientError> {
        let _guard = self.shared.invite_lock.lock().await;

        let state = self.state();
        if state.is_terminal() {
            return Ok(InviteOutcome::Closed);
        }
        if state != ConnectionState::LoggedIn {
            return Err(ClientError::NotLoggedIn { state });
        }

        let waiter = self.shared.invite_slot.arm();
        self.emit(ClientEvent::InvitePlayer {
            invitee: name.to_string(),
        })
        .await?;

        Ok(match waiter.wait(timeout).await {
            SlotOutcome::Filled(reply) => {
                info!(invitee = name, ?reply, "invite answered");
                InviteOutcome::Reply(reply)
            }
            SlotOutcome::TimedOut => {
                warn!(invitee = name, timeout_ms = timeout.as_millis() as u64, "invite timed out");
                InviteOutcome::TimedOut
            }
            SlotOutcome::Closed => InviteOutcome::Closed,
        })
    }

    /// [`invite_opponent`](Self::invite_opponent) with the configured timeout.
    pub async fn invite(&self, name: &str) -> Result<InviteOutcome, ClientError> {
        self.invite_opponent(name, self.shared.config.invite_timeout)
            .await
    }

    pub async fn accept_invitation(&self, room_id: &str) -> Result<(), ClientError> {
        self.require_open()?;
        info!(room_id, "accepting invitation");
        self.emit(ClientEvent::AcceptInvitation {
            room_id: room_id.to_string(),
        })
        .await
    }

    pub async fn start_game(&self, room_id: &str) -> Result<(), ClientError> {
        self.require_open()?;
        self.emit(ClientEvent::StartGame {
            room_id: room_id.to_string(),
        })
        .await
    }

    pub async fn send_move(&self, room_id: &str, mv: &str) -> Result<(), ClientError> {
        self.require_open()?;
        self.emit(ClientEvent::Move {
            room_id: room_id.to_string(),
            mv: mv.to_string(),
        })
        .await
    }

    fn require_open(&self) -> Result<(), ClientError> {
        let state = self.state();
        if state.is_open() {
            Ok(())
        } else {
            Err(ClientError::NotConnected { state })
        }
    }

    /// Close the connection. Idempotent.
    pub async fn disconnect(&self) {
        self.shared.shutdown.notify_one();
        self.shared.finish_close("client disconnect").await;
        let handle = self.shared.read_task.lock().ok().and_then(|mut t| t.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    async fn transition(&self, next: ConnectionState) -> Result<ConnectionState, ClientError> {
        let mut connection = self.connection.lock().await;
        self.apply(&mut connection, next)
    }

    /// Caller holds the connection lock.
    fn apply(
        &self,
        connection: &mut ConnectionSnapshot,
        next: ConnectionState,
    ) -> Result<ConnectionState, ClientError> {
        let prev = connection.state;
        if !prev.can_transition_to(next) {
            return Err(ClientError::InvalidTransition {
                from: prev,
                to: next,
            });
        }
        connection.state = next;
        self.state_tx.send_replace(next);
        debug!(from = %prev, to = %next, "state transition");
        Ok(prev)
    }

    fn log_wire(&self, record: WireRecord) {
        if let Some(tx) = self.wire_log.get() {
            let _ = tx.send(record);
        }
    }

    async fn send_raw(&self, raw: &str) -> Result<(), ClientError> {
        let state = self.state();
        if !state.is_connected() {
            return Err(ClientError::NotConnected { state });
        }
        let mut writer = self.writer.lock().await;
        self.write_locked(&mut writer, raw).await
    }

    async fn emit(&self, event: ClientEvent) -> Result<(), ClientError> {
        self.send_raw(&frame::encode(&event.into_frame())).await
    }

    async fn write_locked(
        &self,
        writer: &mut Option<Box<dyn FrameWriter>>,
        raw: &str,
    ) -> Result<(), ClientError> {
        let Some(writer) = writer.as_mut() else {
            return Err(ClientError::NotConnected {
                state: self.state(),
            });
        };
        debug!(frame = raw, ">>");
        self.log_wire(WireRecord::Outbound(raw.to_string()));
        writer.send_frame(raw).await
    }

    async fn on_handshake(&self, handshake: Handshake) -> Result<(), ClientError> {
        // Holding the writer across the transition keeps other senders from
        // slipping in ahead of the namespace open.
        let mut writer = self.writer.lock().await;
        {
            let mut connection = self.connection.lock().await;
            self.apply(&mut connection, ConnectionState::Open)?;
            connection.session_id = Some(handshake.sid.clone());
            connection.ping_interval_ms = handshake.ping_interval_ms;
            connection.ping_timeout_ms = handshake.ping_timeout_ms;
        }
        info!(
            sid = %handshake.sid,
            ping_interval_ms = handshake.ping_interval_ms,
            ping_timeout_ms = handshake.ping_timeout_ms,
            "handshake complete"
        );

        self.write_locked(&mut writer, &frame::encode(&Frame::Open))
            .await?;
        let login = ClientEvent::SetPlayerName(self.config.username.clone()).into_frame();
        self.write_locked(&mut writer, &frame::encode(&login)).await
    }

    async fn on_event(&self, event: EventFrame) -> Result<(), ClientError> {
        let event = ServerEvent::from_frame(event)?;
        match event {
            ServerEvent::PlayerNameSet(confirmed) => {
                self.on_name_confirmed(confirmed.name).await;
            }
            ServerEvent::InvitationSent(sent) => {
                self.invite_slot.fill(InviteReply::Sent {
                    room_id: sent.room_id,
                    invitee: sent.invitee,
                    message: sent.message,
                });
            }
            ServerEvent::InvitationError(rejected) => {
                self.invite_slot.fill(InviteReply::Rejected {
                    message: rejected.message,
                });
            }
            ServerEvent::Invitation(invitation) => {
                info!(from = %invitation.from, room_id = %invitation.room_id, "invitation received");
                self.forward(SessionEvent::InvitationReceived {
                    inviter: invitation.from,
                    room_id: invitation.room_id,
                });
            }
            ServerEvent::InviteAccepted(room) => {
                self.forward(SessionEvent::InviteAccepted {
                    room_id: room.room_id,
                });
            }
            ServerEvent::PlayerJoined(room) => {
                self.forward(SessionEvent::PlayerJoined {
                    room_id: room.room_id,
                });
            }
            ServerEvent::GameStart(start) => self.forward(SessionEvent::GameStarted(start)),
            ServerEvent::GameState(update) => self.forward(SessionEvent::PositionUpdated(update)),
            ServerEvent::Unrecognized { name, .. } => {
                debug!(event = %name, "ignoring unrecognized event");
            }
        }
        Ok(())
    }

    async fn on_name_confirmed(&self, name: String) {
        let mut connection = self.connection.lock().await;
        match connection.state {
            ConnectionState::Open => {
                // Name first, so a login waiter always finds it set.
                self.record_name(&name).await;
                if self.apply(&mut connection, ConnectionState::LoggedIn).is_ok() {
                    info!(name = %name, "logged in");
                }
            }
            ConnectionState::LoggedIn => {
                self.record_name(&name).await;
                info!(name = %name, "name changed");
            }
            state => warn!(%state, name = %name, "name confirmation outside an open session"),
        }
    }

    /// Caller holds the connection lock.
    async fn record_name(&self, name: &str) {
        let mut login = self.login.write().await;
        if name != login.username {
            warn!(requested = %login.username, confirmed = %name, "server confirmed a different name");
        }
        login.confirmed = Some(name.to_string());
    }

    fn forward(&self, event: SessionEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("session event dropped, no listener");
        }
    }

    /// Closing, then release the transport, then Closed. Runs once.
    async fn finish_close(&self, reason: &str) {
        if self.close_started.swap(true, Ordering::AcqRel) {
            let mut rx = self.state_tx.subscribe();
            let _ = rx.wait_for(|s| *s == ConnectionState::Closed).await;
            return;
        }

        {
            let mut connection = self.connection.lock().await;
            if !connection.state.is_terminal() {
                let _ = self.apply(&mut connection, ConnectionState::Closing);
            }
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.close().await {
                debug!(error = %e, "transport close failed");
            }
        }
        self.invite_slot.close();

        {
            let mut connection = self.connection.lock().await;
            let _ = self.apply(&mut connection, ConnectionState::Closed);
        }
        self.forward(SessionEvent::Closed);
        info!(reason, "connection closed");
    }
}

async fn read_loop(shared: Arc<Shared>, mut reader: Box<dyn FrameReader>) {
    let mut handlers = JoinSet::new();

    let reason = loop {
        while let Some(done) = handlers.try_join_next() {
            if let Err(e) = done {
                if e.is_panic() {
                    error!(error = %e, "frame handler panicked");
                }
            }
        }

        let next = tokio::select! {
            next = reader.next_frame() => next,
            _ = shared.shutdown.notified() => break "client disconnect",
        };
        let raw = match next {
            Ok(Some(raw)) => raw,
            Ok(None) => break "stream closed",
            Err(e) => {
                error!(error = %e, "read failed");
                break "read error";
            }
        };
        debug!(frame = %raw, "<<");
        shared.log_wire(WireRecord::Inbound(raw.clone()));

        match frame::decode(&raw) {
            Ok(Frame::Disconnect) => break "server disconnect",
            Ok(frame) => {
                handlers.spawn(handle_frame(Arc::clone(&shared), frame));
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "unusable handshake");
                break "bad handshake";
            }
            Err(e) => warn!(error = %e, "discarding frame"),
        }
    };

    handlers.abort_all();
    while handlers.join_next().await.is_some() {}
    shared.finish_close(reason).await;
}

async fn handle_frame(shared: Arc<Shared>, frame: Frame) {
    let result = match frame {
        Frame::Handshake(handshake) => shared.on_handshake(handshake).await,
        Frame::Ping => shared.send_raw(&frame::encode(&Frame::Pong)).await,
        Frame::Event(event) => shared.on_event(event).await,
        Frame::Open | Frame::Pong | Frame::Disconnect => Ok(()),
    };
    if let Err(e) = result {
        warn!(error = %e, "frame handler failed");
    }
}
