//! The host's network session: the event loop that owns the game controller
//! and the transport.
//!
//! All state mutation happens inside this loop's message and timer arms, so
//! the read-modify-broadcast pattern needs no locks. After every mutation the
//! full session state is pushed to each client individually, masked through
//! `redact` so non-drawers never see the secret word, and a fresh snapshot is
//! sent directly to new joiners to close the race where a broadcast fires
//! before their registration.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::Notify;
use tokio::time::{interval, MissedTickBehavior};

use shared::protocol::Message;
use shared::state::{redact, GameSettings, SessionState};
use shared::transport::{PeerAddr, Transport, TransportEvent};
use shared::{HEARTBEAT_INTERVAL, HEARTBEAT_TIMEOUT};

use crate::game::{GameController, JoinOutcome};
use crate::roster::Roster;

pub struct HostSession<T: Transport> {
    transport: T,
    game: GameController,
    roster: Roster,
    /// Start automatically once this many players are in the lobby.
    auto_start: Option<usize>,
    shutdown: Arc<Notify>,
}

impl<T: Transport> HostSession<T> {
    /// Creates a session and registers the host itself as the first player.
    pub fn new(
        transport: T,
        name: &str,
        avatar_id: u32,
        settings: GameSettings,
        category: &str,
    ) -> Self {
        let mut game = GameController::new(settings, category);
        let local = transport.local_addr().clone();
        game.join(&local, name, avatar_id, true);

        HostSession {
            transport,
            game,
            roster: Roster::new(HEARTBEAT_TIMEOUT),
            auto_start: None,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// The host's own address, shared with players as the room code.
    pub fn room_code(&self) -> &PeerAddr {
        self.transport.local_addr()
    }

    pub fn state(&self) -> &SessionState {
        self.game.state()
    }

    /// Arms lobby auto-start at the given player count.
    pub fn auto_start_at(&mut self, players: usize) {
        self.auto_start = Some(players);
    }

    /// Handle used to stop a running session from another task.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Starts the game from the lobby.
    pub fn start_game(&mut self) -> bool {
        if self.game.start() {
            self.broadcast_state();
            true
        } else {
            false
        }
    }

    /// Chat input from the host's own player.
    pub fn local_chat(&mut self, text: &str) {
        let addr = self.transport.local_addr().clone();
        if self.game.chat(&addr, text) {
            self.broadcast_state();
        }
    }

    /// Word selection from the host's own player.
    pub fn local_select_word(&mut self, word: &str) {
        let addr = self.transport.local_addr().clone();
        if self.game.select_word(&addr, word) {
            self.broadcast_state();
        }
    }

    /// Drawing input from the host's own player, relayed like any drawer's.
    pub fn local_draw(&mut self, message: Message) {
        let addr = self.transport.local_addr().clone();
        self.relay_drawing(&addr, message);
    }

    /// Runs the session until the transport closes or the shutdown handle
    /// fires.
    pub async fn run(&mut self) {
        let mut tick = interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut heartbeat = interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Both intervals fire immediately once; consume those so the first
        // game second is a full second long.
        tick.tick().await;
        heartbeat.tick().await;

        info!("hosting room {}", self.room_code());

        loop {
            let shutdown = Arc::clone(&self.shutdown);
            tokio::select! {
                event = self.transport.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            info!("transport closed, stopping host session");
                            break;
                        }
                    }
                },

                _ = tick.tick() => {
                    self.handle_tick();
                },

                _ = heartbeat.tick() => {
                    self.send_raw_broadcast(&Message::Ping);
                },

                _ = shutdown.notified() => {
                    info!("host session shut down");
                    break;
                },
            }
        }
    }

    fn handle_tick(&mut self) {
        if self.game.tick() {
            self.broadcast_state();
        }

        let mut changed = false;
        for addr in self.roster.check_timeouts() {
            if self.game.mark_disconnected(&addr) {
                changed = true;
            }
        }
        if changed {
            self.broadcast_state();
        }
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::PeerConnected { addr } => {
                debug!("peer {} connected", addr);
                self.roster.touch(&addr);
            }
            TransportEvent::PeerDisconnected { addr } => {
                if self.game.mark_disconnected(&addr) {
                    self.broadcast_state();
                }
            }
            TransportEvent::Message { from, bytes } => {
                let Some(message) = Message::decode(&bytes) else {
                    warn!("dropping malformed message from {}", from);
                    return;
                };
                self.roster.touch(&from);
                self.handle_message(from, message);
            }
        }
    }

    /// Dispatch table over the message catalog. Every inbound value that
    /// affects shared state is re-validated here; client-side checks are a
    /// courtesy only.
    fn handle_message(&mut self, from: PeerAddr, message: Message) {
        match message {
            Message::JoinRequest { name, avatar_id } => {
                match self.game.join(&from, &name, avatar_id, false) {
                    JoinOutcome::Joined | JoinOutcome::Reconnected => {
                        self.broadcast_state();
                        self.send_snapshot(&from);
                        self.maybe_auto_start();
                    }
                    JoinOutcome::AlreadyJoined => self.send_snapshot(&from),
                    JoinOutcome::Rejected => {}
                }
            }
            Message::SelectWord { word } => {
                if self.game.select_word(&from, &word) {
                    self.broadcast_state();
                }
            }
            Message::Chat { message } => {
                if !self.roster.allow_chat(&from) {
                    debug!("rate-limiting chat from {}", from);
                    return;
                }
                if self.game.chat(&from, &message.text) {
                    self.broadcast_state();
                }
            }
            Message::SubmitDrawing { data } => {
                if self.game.submit_drawing(&from, data) {
                    self.broadcast_state();
                }
            }
            Message::AvatarUpdate { avatar_id } => {
                if self.game.set_avatar(&from, avatar_id) {
                    self.broadcast_state();
                }
            }
            Message::DrawStroke { .. }
            | Message::StrokeBatch { .. }
            | Message::StrokeStart
            | Message::UndoStroke => {
                self.relay_drawing(&from, message);
            }
            Message::Ping => self.send(&from, &Message::Pong),
            Message::Pong => {}
            Message::GameStateUpdate { .. } => {
                debug!("ignoring state update from client {}", from);
            }
        }
    }

    fn maybe_auto_start(&mut self) {
        if let Some(threshold) = self.auto_start {
            if self.game.state().players.len() >= threshold {
                info!("lobby reached {} players, starting", threshold);
                if self.start_game() {
                    self.auto_start = None;
                }
            }
        }
    }

    /// Fans a drawing event out verbatim to every other connected player.
    /// Only the current drawer's events are honored.
    fn relay_drawing(&mut self, from: &PeerAddr, message: Message) {
        if !self.game.state().is_drawer(from) {
            debug!("dropping drawing event from non-drawer {}", from);
            return;
        }

        let bytes = match bincode::serialize(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("failed to encode drawing event: {}", e);
                return;
            }
        };

        let local = self.transport.local_addr().clone();
        let recipients: Vec<PeerAddr> = self
            .game
            .state()
            .players
            .iter()
            .filter(|p| p.is_connected && &p.addr != from && p.addr != local)
            .map(|p| p.addr.clone())
            .collect();
        for addr in recipients {
            self.transport.send(&addr, bytes.clone());
        }
    }

    /// Pushes the current state to every connected client, independently
    /// redacted per recipient.
    fn broadcast_state(&mut self) {
        let local = self.transport.local_addr().clone();
        let recipients: Vec<PeerAddr> = self
            .game
            .state()
            .players
            .iter()
            .filter(|p| p.is_connected && p.addr != local)
            .map(|p| p.addr.clone())
            .collect();
        for addr in recipients {
            self.send_snapshot(&addr);
        }
    }

    fn send_snapshot(&mut self, addr: &PeerAddr) {
        let state = redact(self.game.state(), addr);
        self.send(addr, &Message::GameStateUpdate { state });
    }

    fn send(&mut self, addr: &PeerAddr, message: &Message) {
        match bincode::serialize(message) {
            Ok(bytes) => self.transport.send(addr, bytes),
            Err(e) => warn!("failed to encode message for {}: {}", addr, e),
        }
    }

    /// Transport-level broadcast for payloads that need no masking.
    fn send_raw_broadcast(&mut self, message: &Message) {
        match bincode::serialize(message) {
            Ok(bytes) => self.transport.broadcast(bytes),
            Err(e) => warn!("failed to encode broadcast: {}", e),
        }
    }
}
