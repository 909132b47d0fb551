//! The client session controller.
//!
//! Connects to a host's room code with exponential backoff, joins with a
//! display name and avatar, then applies every host-pushed snapshot as a
//! wholesale replacement of the local state. Local gameplay intents are
//! fire-and-forget; no send awaits an acknowledgment. A heartbeat monitor
//! watches for a host that goes dark without an explicit disconnect event
//! and degrades the connection status so the presentation layer can show
//! "lost connection, retrying" instead of tearing the session down.

use log::{debug, info, warn};
use tokio::time::{interval, Interval, MissedTickBehavior};

use shared::protocol::{ChatKind, ChatMessage, Message, Stroke};
use shared::resilience::{Backoff, HeartbeatMonitor};
use shared::state::SessionState;
use shared::transport::{PeerAddr, Transport, TransportError, TransportEvent};
use shared::validation::{self, RateLimiter};
use shared::{now_millis, HEARTBEAT_INTERVAL, HEARTBEAT_TIMEOUT};

use crate::canvas::{DrawingEvent, StrokeBuffer};

/// Where the connection currently stands. Distinct from the "ever connected"
/// flag: a session that never reached the host reads `Error`, one that lost
/// an established link reads `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// What the session surfaced to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A fresh snapshot replaced the local state.
    StateUpdated,
    /// A relayed drawing event to replay against the local surface.
    Drawing(DrawingEvent),
    /// The host went dark or the transport reported a disconnect.
    ConnectionLost,
    /// The transport shut down for good.
    Closed,
}

pub struct ClientSession<T: Transport> {
    transport: T,
    host: PeerAddr,
    name: String,
    avatar_id: u32,
    status: ConnectionStatus,
    ever_connected: bool,
    state: SessionState,
    monitor: HeartbeatMonitor,
    heartbeat: Interval,
    limiter: RateLimiter,
    buffer: StrokeBuffer,
    next_local_id: u64,
}

impl<T: Transport> ClientSession<T> {
    /// Must be constructed inside a tokio runtime (the heartbeat timer is
    /// created eagerly).
    pub fn new(transport: T, host: PeerAddr, name: &str, avatar_id: u32) -> Self {
        let mut heartbeat = interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        ClientSession {
            transport,
            host,
            name: validation::sanitize_name(name),
            avatar_id,
            status: ConnectionStatus::Connecting,
            ever_connected: false,
            state: SessionState::default(),
            monitor: HeartbeatMonitor::new(HEARTBEAT_INTERVAL, HEARTBEAT_TIMEOUT),
            heartbeat,
            limiter: RateLimiter::default(),
            buffer: StrokeBuffer::new(),
            next_local_id: 1,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn ever_connected(&self) -> bool {
        self.ever_connected
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn local_addr(&self) -> &PeerAddr {
        self.transport.local_addr()
    }

    /// Whether this client is the current drawer.
    pub fn is_drawer(&self) -> bool {
        self.state.is_drawer(self.transport.local_addr())
    }

    /// Connects to the host with backoff and sends the join request. On
    /// exhausted retries the last error is surfaced and the status reads
    /// `Error`.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        self.status = ConnectionStatus::Connecting;
        info!("connecting to room {}", self.host);

        let mut backoff = Backoff::default();
        loop {
            match self.transport.connect(&self.host).await {
                Ok(()) => break,
                Err(e) => {
                    let Some(delay) = backoff.next_delay() else {
                        warn!("connection to {} failed: {}", self.host, e);
                        self.status = ConnectionStatus::Error;
                        return Err(e);
                    };
                    info!(
                        "attempt {}/{} failed ({}), retrying in {:?}",
                        backoff.attempt(),
                        backoff.max_attempts(),
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        self.status = ConnectionStatus::Connected;
        self.ever_connected = true;
        self.monitor.record();
        self.send(&Message::JoinRequest {
            name: self.name.clone(),
            avatar_id: self.avatar_id,
        });
        info!("joined room {}", self.host);
        Ok(())
    }

    /// Re-establishes a lost connection; the host recognizes the address and
    /// revives the existing player record.
    pub async fn reconnect(&mut self) -> Result<(), TransportError> {
        self.connect().await
    }

    /// Waits for the next session event, answering heartbeats and filtering
    /// non-host traffic along the way.
    pub async fn next_event(&mut self) -> ClientEvent {
        loop {
            // Biased toward the message arm: a backlog of host traffic must
            // be drained (rearming the monitor) before silence is judged.
            tokio::select! {
                biased;

                event = self.transport.recv() => {
                    match event {
                        None => {
                            self.status = ConnectionStatus::Disconnected;
                            return ClientEvent::Closed;
                        }
                        Some(TransportEvent::PeerConnected { .. }) => {}
                        Some(TransportEvent::PeerDisconnected { addr }) => {
                            if addr == self.host {
                                self.status = ConnectionStatus::Disconnected;
                                return ClientEvent::ConnectionLost;
                            }
                        }
                        Some(TransportEvent::Message { from, bytes }) => {
                            if from != self.host {
                                debug!("ignoring message from non-host peer {}", from);
                                continue;
                            }
                            let Some(message) = Message::decode(&bytes) else {
                                warn!("dropping malformed message from host");
                                continue;
                            };
                            self.monitor.record();
                            if let Some(event) = self.handle_host_message(message) {
                                return event;
                            }
                        }
                    }
                },

                _ = self.heartbeat.tick() => {
                    if self.status == ConnectionStatus::Connected {
                        self.send(&Message::Ping);
                        if self.monitor.timed_out() {
                            warn!("host went silent, marking connection lost");
                            self.status = ConnectionStatus::Disconnected;
                            return ClientEvent::ConnectionLost;
                        }
                    }
                },
            }
        }
    }

    fn handle_host_message(&mut self, message: Message) -> Option<ClientEvent> {
        match message {
            Message::GameStateUpdate { state } => {
                // Wholesale replacement: the host snapshot is authoritative
                // and complete, never merged.
                self.state = state;
                Some(ClientEvent::StateUpdated)
            }
            Message::Ping => {
                self.send(&Message::Pong);
                None
            }
            Message::Pong => None,
            Message::DrawStroke { stroke } => {
                Some(ClientEvent::Drawing(DrawingEvent::Stroke(stroke)))
            }
            Message::StrokeBatch { batch } => {
                Some(ClientEvent::Drawing(DrawingEvent::Batch(batch)))
            }
            Message::StrokeStart => Some(ClientEvent::Drawing(DrawingEvent::Start)),
            Message::UndoStroke => Some(ClientEvent::Drawing(DrawingEvent::Undo)),
            other => {
                debug!("ignoring unexpected host message: {:?}", other);
                None
            }
        }
    }

    /// Sends a chat line or guess. Validated and rate-limited locally as a
    /// courtesy; the host re-checks everything.
    pub fn send_chat(&mut self, text: &str) -> bool {
        let text = validation::sanitize_message(text);
        if !validation::valid_guess(&text) {
            return false;
        }
        if !self.limiter.allow() {
            debug!("chat rate limit hit, dropping message");
            return false;
        }

        let message = ChatMessage {
            id: self.next_local_id,
            sender: self.transport.local_addr().clone(),
            sender_name: self.name.clone(),
            text,
            kind: ChatKind::Chat,
            correct: false,
            timestamp_ms: now_millis(),
        };
        self.next_local_id += 1;
        self.send(&Message::Chat { message });
        true
    }

    /// Picks one of the offered words (only honored if we are the drawer).
    pub fn select_word(&mut self, word: &str) -> bool {
        if !validation::valid_word(word) {
            return false;
        }
        self.send(&Message::SelectWord {
            word: word.trim().to_string(),
        });
        true
    }

    pub fn set_avatar(&mut self, avatar_id: u32) {
        self.avatar_id = avatar_id;
        self.send(&Message::AvatarUpdate { avatar_id });
    }

    /// Hands in a finished drawing image (legacy vote mode).
    pub fn submit_drawing(&mut self, data: &str) -> bool {
        if validation::valid_drawing_data(data).is_err() {
            return false;
        }
        self.send(&Message::SubmitDrawing {
            data: data.to_string(),
        });
        true
    }

    /// Pen-down: announces the stroke start so peers snapshot for undo.
    pub fn pen_down(&mut self) {
        self.buffer = StrokeBuffer::new();
        self.send(&Message::StrokeStart);
    }

    /// A pointer-move sample; ships a batch when the buffer fills.
    pub fn add_stroke(&mut self, stroke: Stroke) {
        if let Some(batch) = self.buffer.push(stroke) {
            self.send(&Message::StrokeBatch { batch });
        }
    }

    /// Pen-up: flushes whatever is still buffered.
    pub fn pen_up(&mut self) {
        if let Some(batch) = self.buffer.flush() {
            self.send(&Message::StrokeBatch { batch });
        }
    }

    /// A flood fill is never batched; it ships immediately as the zero-size
    /// sentinel stroke.
    pub fn fill(&mut self, x: i32, y: i32, color: u32) {
        self.send(&Message::DrawStroke {
            stroke: Stroke::fill(x, y, color),
        });
    }

    pub fn undo(&mut self) {
        self.send(&Message::UndoStroke);
    }

    fn send(&self, message: &Message) {
        match bincode::serialize(message) {
            Ok(bytes) => self.transport.send(&self.host, bytes),
            Err(e) => warn!("failed to encode message: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use shared::state::{GameSettings, Phase, Player};
    use shared::transport::{MemoryNetwork, MemoryTransport};

    async fn connected_pair() -> (ClientSession<MemoryTransport>, MemoryTransport) {
        let network = MemoryNetwork::new();
        let host = network.open(Some("HOST1")).unwrap();
        let transport = network.open(Some("AAAAA")).unwrap();

        let mut session = ClientSession::new(transport, "HOST1".to_string(), "Ada", 2);
        session.connect().await.unwrap();
        (session, host)
    }

    async fn next_message(host: &mut MemoryTransport) -> Option<Message> {
        loop {
            match tokio::time::timeout(Duration::from_millis(50), host.recv()).await {
                Ok(Some(TransportEvent::Message { bytes, .. })) => {
                    return Message::decode(&bytes);
                }
                Ok(Some(_)) => continue,
                _ => return None,
            }
        }
    }

    fn sample_state() -> SessionState {
        let mut state = SessionState::with_settings(GameSettings::default());
        state.phase = Phase::Drawing;
        state.timer = 42;
        state.drawer = Some("HOST1".to_string());
        state.hint = "___".to_string();
        state.players.push(Player::new(
            "HOST1".to_string(),
            "Host".to_string(),
            0,
            true,
        ));
        state.players.push(Player::new(
            "AAAAA".to_string(),
            "Ada".to_string(),
            2,
            false,
        ));
        state
    }

    #[tokio::test]
    async fn connect_sends_join_request() {
        let (session, mut host) = connected_pair().await;
        assert_eq!(session.status(), ConnectionStatus::Connected);
        assert!(session.ever_connected());

        match next_message(&mut host).await {
            Some(Message::JoinRequest { name, avatar_id }) => {
                assert_eq!(name, "Ada");
                assert_eq!(avatar_id, 2);
            }
            other => panic!("expected join request, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn connect_failure_surfaces_error_status() {
        let network = MemoryNetwork::new();
        let transport = network.open(Some("AAAAA")).unwrap();
        let mut session = ClientSession::new(transport, "GHOST".to_string(), "Ada", 0);

        tokio::time::pause();
        let result = session.connect().await;
        assert!(result.is_err());
        assert_eq!(session.status(), ConnectionStatus::Error);
        assert!(!session.ever_connected());
    }

    #[tokio::test]
    async fn snapshots_replace_state_wholesale() {
        let (mut session, host) = connected_pair().await;

        let pushed = sample_state();
        host.send(
            &"AAAAA".to_string(),
            bincode::serialize(&Message::GameStateUpdate {
                state: pushed.clone(),
            })
            .unwrap(),
        );

        let event = session.next_event().await;
        assert_eq!(event, ClientEvent::StateUpdated);
        assert_eq!(session.state(), &pushed);
        assert!(!session.is_drawer());
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let (mut session, mut host) = connected_pair().await;
        // Drain the join request first.
        assert!(matches!(
            next_message(&mut host).await,
            Some(Message::JoinRequest { .. })
        ));

        host.send(
            &"AAAAA".to_string(),
            bincode::serialize(&Message::Ping).unwrap(),
        );
        // Feed a state update right behind so next_event returns.
        host.send(
            &"AAAAA".to_string(),
            bincode::serialize(&Message::GameStateUpdate {
                state: sample_state(),
            })
            .unwrap(),
        );
        session.next_event().await;

        let mut saw_pong = false;
        let mut guard = 0;
        while let Some(message) = next_message(&mut host).await {
            if message == Message::Pong {
                saw_pong = true;
                break;
            }
            guard += 1;
            assert!(guard < 10);
        }
        assert!(saw_pong);
    }

    #[tokio::test]
    async fn drawing_events_are_surfaced_for_replay() {
        let (mut session, host) = connected_pair().await;

        host.send(
            &"AAAAA".to_string(),
            bincode::serialize(&Message::StrokeStart).unwrap(),
        );
        host.send(
            &"AAAAA".to_string(),
            bincode::serialize(&Message::UndoStroke).unwrap(),
        );

        assert_eq!(
            session.next_event().await,
            ClientEvent::Drawing(DrawingEvent::Start)
        );
        assert_eq!(
            session.next_event().await,
            ClientEvent::Drawing(DrawingEvent::Undo)
        );
    }

    #[tokio::test]
    async fn non_host_messages_are_ignored() {
        let network = MemoryNetwork::new();
        let host = network.open(Some("HOST1")).unwrap();
        let stranger = network.open(Some("EVIL1")).unwrap();
        let transport = network.open(Some("AAAAA")).unwrap();

        let mut session = ClientSession::new(transport, "HOST1".to_string(), "Ada", 0);
        session.connect().await.unwrap();
        stranger.connect(&"AAAAA".to_string()).await.unwrap();

        stranger.send(
            &"AAAAA".to_string(),
            bincode::serialize(&Message::GameStateUpdate {
                state: sample_state(),
            })
            .unwrap(),
        );
        host.send(
            &"AAAAA".to_string(),
            bincode::serialize(&Message::StrokeStart).unwrap(),
        );

        // The stranger's snapshot never lands; the host's stroke does.
        let event = session.next_event().await;
        assert_eq!(event, ClientEvent::Drawing(DrawingEvent::Start));
        assert_eq!(session.state().players.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_host_trips_heartbeat_timeout() {
        let (mut session, host) = connected_pair().await;
        host.vanish();

        let event = session.next_event().await;
        assert_eq!(event, ClientEvent::ConnectionLost);
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert!(session.ever_connected());
    }

    #[tokio::test]
    async fn explicit_host_disconnect_is_reported() {
        let (mut session, host) = connected_pair().await;
        drop(host);

        let event = session.next_event().await;
        assert_eq!(event, ClientEvent::ConnectionLost);
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn reconnect_rejoins_the_room() {
        let (mut session, mut host) = connected_pair().await;
        assert!(matches!(
            next_message(&mut host).await,
            Some(Message::JoinRequest { .. })
        ));

        session.reconnect().await.unwrap();
        assert_eq!(session.status(), ConnectionStatus::Connected);
        assert!(matches!(
            next_message(&mut host).await,
            Some(Message::JoinRequest { .. })
        ));
    }

    #[tokio::test]
    async fn stroke_batching_flushes_at_size_and_pen_up() {
        let (mut session, mut host) = connected_pair().await;
        assert!(matches!(
            next_message(&mut host).await,
            Some(Message::JoinRequest { .. })
        ));

        let stroke = |i: i32| Stroke {
            x: i,
            y: 0,
            last_x: i - 1,
            last_y: 0,
            color: 0,
            size: 2,
            is_eraser: false,
        };

        session.pen_down();
        for i in 0..5 {
            session.add_stroke(stroke(i));
        }
        session.add_stroke(stroke(5));
        session.pen_up();

        assert_eq!(next_message(&mut host).await, Some(Message::StrokeStart));
        match next_message(&mut host).await {
            Some(Message::StrokeBatch { batch }) => assert_eq!(batch.strokes.len(), 5),
            other => panic!("expected full batch, got {:?}", other),
        }
        match next_message(&mut host).await {
            Some(Message::StrokeBatch { batch }) => assert_eq!(batch.strokes.len(), 1),
            other => panic!("expected pen-up remainder, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fill_is_sent_immediately_as_sentinel() {
        let (mut session, mut host) = connected_pair().await;
        assert!(matches!(
            next_message(&mut host).await,
            Some(Message::JoinRequest { .. })
        ));

        session.fill(7, 9, 0x00ff_0000);
        match next_message(&mut host).await {
            Some(Message::DrawStroke { stroke }) => {
                assert!(stroke.is_fill());
                assert_eq!((stroke.x, stroke.y), (7, 9));
            }
            other => panic!("expected fill sentinel, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn chat_is_validated_and_rate_limited() {
        let (mut session, _host) = connected_pair().await;

        assert!(!session.send_chat("   "));
        for _ in 0..5 {
            assert!(session.send_chat("guess"));
        }
        assert!(!session.send_chat("one too many"));
    }

    #[tokio::test]
    async fn invalid_drawing_submission_is_rejected_locally() {
        let (mut session, _host) = connected_pair().await;
        assert!(!session.submit_drawing("nope"));

        let image = format!("data:image/png;base64,{}", "A".repeat(200));
        assert!(session.submit_drawing(&image));
    }
}
