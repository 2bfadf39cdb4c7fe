//! SessionOrchestrator: ties the directory, registry, gate and scheduler
//! together behind one message-dispatch surface.
//!
//! The transport layer owns sockets and JSON; this module owns semantics.
//! Every inbound [`ClientMessage`] lands in [`SessionOrchestrator::handle_message`],
//! and every reply or notification leaves through the injected
//! [`OutboundSink`], addressed by connection id.  The orchestrator never
//! touches a socket.
//!
//! # Locking
//!
//! One `tokio::sync::Mutex` guards *both* the client directory and the room
//! registry ([`SessionState`]).  Role assignment and room membership must
//! change together (a host record pointing at a destroyed room is the bug
//! class this prevents), and a single lock makes every session transition
//! atomic without lock-ordering rules.  The lock is held only for in-memory
//! mutation; all sink sends and scheduler calls happen after release, so a
//! slow client cannot stall the session state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use screenroom_core::{
    ClientRole, ClientMessage, ConnectionId, ControlCommand, RoomSummary, ServerMessage,
    SettingsPatch,
};

use crate::application::broadcast::{BroadcastScheduler, ScreenCapturer};
use crate::application::client_directory::ClientDirectory;
use crate::application::control_gate::{InputInjector, RemoteControlGate};
use crate::application::rate_limit::RateLimitScope;
use crate::application::room_registry::{Departure, RegistryError, RoomRegistry};

/// The one piece of shared mutable session state.
///
/// Directory and registry live under the same lock; see the module docs for
/// why they are not guarded separately.
#[derive(Debug, Default)]
pub struct SessionState {
    pub directory: ClientDirectory,
    pub rooms: RoomRegistry,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }
}

pub type SharedSessions = Arc<Mutex<SessionState>>;

/// Trait for delivering a [`ServerMessage`] to one connection.
///
/// The transport implements this over its per-connection send handles; tests
/// implement it with a recording double.  Delivery is best-effort: a message
/// for a connection that is already gone is silently dropped, which the
/// transport logs at debug level.
#[async_trait]
pub trait OutboundSink: Send + Sync {
    async fn send(&self, target: ConnectionId, message: ServerMessage);
}

/// Coordinates the full session lifecycle for every connection.
pub struct SessionOrchestrator {
    sessions: SharedSessions,
    scheduler: BroadcastScheduler,
    gate: RemoteControlGate,
    sink: Arc<dyn OutboundSink>,
    started_at: Instant,
}

impl SessionOrchestrator {
    pub fn new(
        capturer: Arc<dyn ScreenCapturer>,
        injector: Arc<dyn InputInjector>,
        sink: Arc<dyn OutboundSink>,
        rate_limit_scope: RateLimitScope,
        command_spacing: Duration,
    ) -> Self {
        let sessions: SharedSessions = Arc::new(Mutex::new(SessionState::new()));
        let scheduler =
            BroadcastScheduler::new(capturer, Arc::clone(&sink), Arc::clone(&sessions));
        let gate = RemoteControlGate::new(injector, rate_limit_scope, command_spacing);
        Self {
            sessions,
            scheduler,
            gate,
            sink,
            started_at: Instant::now(),
        }
    }

    // ── Connection lifecycle ──────────────────────────────────────────────────

    /// Registers a freshly accepted connection.
    pub async fn connect(&self, connection: ConnectionId) {
        let mut state = self.sessions.lock().await;
        state.directory.register(connection);
        debug!(connection = %connection, "connection registered");
    }

    /// Tears down a closed connection: directory record, room membership,
    /// rate-limiter state, and (for a host) the room itself.
    pub async fn disconnect(&self, connection: ConnectionId) {
        enum Teardown {
            Host {
                room_id: String,
                viewers: Vec<ConnectionId>,
            },
            Viewer {
                host: Option<ConnectionId>,
                viewer_count: usize,
            },
            None,
        }

        let teardown = {
            let mut state = self.sessions.lock().await;
            let Some(snapshot) = state.directory.remove(connection) else {
                return;
            };

            match (snapshot.role, snapshot.room_id) {
                (ClientRole::Host, Some(room_id)) => {
                    match state.rooms.leave_room(connection, &room_id) {
                        Departure::HostLeft(room) => {
                            // Detach every evicted viewer's record while still
                            // under the lock, so the room teardown is atomic.
                            for viewer in &room.viewers {
                                state.directory.assign_role(
                                    *viewer,
                                    ClientRole::Unassigned,
                                    None,
                                );
                            }
                            Teardown::Host {
                                room_id,
                                viewers: room.viewers.into_iter().collect(),
                            }
                        }
                        other => {
                            warn!(connection = %connection, room = %room_id, outcome = ?other,
                                  "host record without matching room membership");
                            Teardown::None
                        }
                    }
                }
                (ClientRole::Viewer, Some(room_id)) => {
                    match state.rooms.leave_room(connection, &room_id) {
                        Departure::ViewerLeft { viewer_count } => Teardown::Viewer {
                            host: state.rooms.host_of(&room_id),
                            viewer_count,
                        },
                        _ => Teardown::None,
                    }
                }
                _ => Teardown::None,
            }
        };

        self.gate.forget_connection(connection);

        match teardown {
            Teardown::Host { room_id, viewers } => {
                self.scheduler.stop(&room_id);
                info!(host = %connection, room = %room_id, evicted = viewers.len(),
                      "host disconnected; room torn down");
                for viewer in viewers {
                    self.sink.send(viewer, ServerMessage::HostDisconnected).await;
                }
            }
            Teardown::Viewer { host, viewer_count } => {
                debug!(viewer = %connection, "viewer disconnected");
                if let Some(host) = host {
                    self.sink
                        .send(
                            host,
                            ServerMessage::ViewerDisconnected {
                                viewer_id: connection,
                                viewer_count,
                            },
                        )
                        .await;
                }
            }
            Teardown::None => {
                debug!(connection = %connection, "connection closed");
            }
        }
    }

    // ── Message dispatch ──────────────────────────────────────────────────────

    /// Routes one decoded message from `connection` to its handler.
    pub async fn handle_message(&self, connection: ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::JoinAsHost { room_id, settings } => {
                self.join_as_host(connection, room_id, settings).await;
            }
            ClientMessage::JoinAsViewer { room_id } => {
                self.join_as_viewer(connection, room_id).await;
            }
            ClientMessage::UpdateSettings { settings } => {
                self.update_settings(connection, settings).await;
            }
            ClientMessage::RemoteControl { command } => {
                self.remote_control(connection, command).await;
            }
            ClientMessage::Offer { target, offer } => {
                self.relay(
                    target,
                    ServerMessage::Offer {
                        sender: connection,
                        offer,
                    },
                )
                .await;
            }
            ClientMessage::Answer { target, answer } => {
                self.relay(
                    target,
                    ServerMessage::Answer {
                        sender: connection,
                        answer,
                    },
                )
                .await;
            }
            ClientMessage::IceCandidate { target, candidate } => {
                self.relay(
                    target,
                    ServerMessage::IceCandidate {
                        sender: connection,
                        candidate,
                    },
                )
                .await;
            }
            ClientMessage::ListRooms => {
                let rooms = self.list_rooms().await;
                self.sink
                    .send(connection, ServerMessage::RoomList { rooms })
                    .await;
            }
            ClientMessage::RoomStats { room_id } => {
                let reply = match self.room_stats(&room_id).await {
                    Some(room) => ServerMessage::RoomStats { room },
                    None => ServerMessage::Error {
                        message: RegistryError::RoomNotFound(room_id).to_string(),
                    },
                };
                self.sink.send(connection, reply).await;
            }
            ClientMessage::Health => {
                let reply = self.health().await;
                self.sink.send(connection, reply).await;
            }
        }
    }

    // ── Join / leave ──────────────────────────────────────────────────────────

    async fn join_as_host(
        &self,
        connection: ConnectionId,
        room_id: String,
        settings: Option<SettingsPatch>,
    ) {
        let created = {
            let mut state = self.sessions.lock().await;
            if state.directory.lookup(connection).is_none() {
                warn!(connection = %connection, "join-as-host from unregistered connection");
                return;
            }
            match state
                .rooms
                .create_room(&room_id, connection, settings.as_ref())
            {
                Ok(effective) => {
                    state
                        .directory
                        .assign_role(connection, ClientRole::Host, Some(room_id.clone()));
                    Ok(effective)
                }
                Err(e) => Err(e),
            }
        };

        match created {
            Ok(effective) => {
                if let Err(e) = self.scheduler.start(&room_id, effective) {
                    // Room ids are freed on teardown before the scheduler
                    // stops its task, so a leftover task can linger here.
                    warn!(room = %room_id, error = %e, "stale broadcast task; restarting");
                    let _ = self.scheduler.restart(&room_id, effective);
                }
                info!(host = %connection, room = %room_id,
                      quality = effective.quality, fps = effective.fps, "host joined");
                self.sink
                    .send(
                        connection,
                        ServerMessage::HostJoined {
                            room_id,
                            settings: effective,
                            screen_size: self.gate.screen_size(),
                        },
                    )
                    .await;
            }
            Err(e) => {
                self.sink
                    .send(
                        connection,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
            }
        }
    }

    async fn join_as_viewer(&self, connection: ConnectionId, room_id: String) {
        let joined = {
            let mut state = self.sessions.lock().await;
            if state.directory.lookup(connection).is_none() {
                warn!(connection = %connection, "join-as-viewer from unregistered connection");
                return;
            }
            match state.rooms.join_as_viewer(&room_id, connection) {
                Ok((settings, viewer_count)) => {
                    state.directory.assign_role(
                        connection,
                        ClientRole::Viewer,
                        Some(room_id.clone()),
                    );
                    Ok((settings, viewer_count, state.rooms.host_of(&room_id)))
                }
                Err(e) => Err(e),
            }
        };

        match joined {
            Ok((settings, viewer_count, host)) => {
                info!(viewer = %connection, room = %room_id, viewer_count, "viewer joined");
                self.sink
                    .send(
                        connection,
                        ServerMessage::ViewerJoined {
                            room_id,
                            settings,
                            screen_size: self.gate.screen_size(),
                        },
                    )
                    .await;
                if let Some(host) = host {
                    self.sink
                        .send(
                            host,
                            ServerMessage::ViewerConnected {
                                viewer_id: connection,
                                viewer_count,
                            },
                        )
                        .await;
                }
            }
            Err(_) => {
                self.sink
                    .send(
                        connection,
                        ServerMessage::Error {
                            message: "Room not found or no active host".to_string(),
                        },
                    )
                    .await;
            }
        }
    }

    // ── Settings ──────────────────────────────────────────────────────────────

    async fn update_settings(&self, connection: ConnectionId, patch: SettingsPatch) {
        let outcome = {
            let mut state = self.sessions.lock().await;
            let room_id = state
                .directory
                .lookup(connection)
                .and_then(|client| client.room_id.clone());
            match room_id {
                Some(room_id) => match state.rooms.update_settings(&room_id, connection, &patch)
                {
                    Ok(settings) => {
                        let viewers =
                            state.rooms.viewer_ids(&room_id).unwrap_or_default();
                        Ok((room_id, settings, viewers))
                    }
                    Err(e) => Err(e.to_string()),
                },
                None => Err("not currently in a room".to_string()),
            }
        };

        match outcome {
            Ok((room_id, settings, viewers)) => {
                // Restart so the new cadence applies on the very next tick
                // instead of finishing out the old period.
                if let Err(e) = self.scheduler.restart(&room_id, settings) {
                    warn!(room = %room_id, error = %e, "broadcast restart failed");
                }
                info!(room = %room_id, quality = settings.quality, fps = settings.fps,
                      "settings updated");
                let notice = ServerMessage::SettingsUpdated {
                    quality: settings.quality,
                    fps: settings.fps,
                };
                self.sink.send(connection, notice.clone()).await;
                for viewer in viewers {
                    self.sink.send(viewer, notice.clone()).await;
                }
            }
            Err(message) => {
                self.sink
                    .send(connection, ServerMessage::Error { message })
                    .await;
            }
        }
    }

    // ── Remote control ────────────────────────────────────────────────────────

    async fn remote_control(&self, connection: ConnectionId, command: ControlCommand) {
        let client = {
            let mut state = self.sessions.lock().await;
            state.directory.touch(connection);
            state.directory.lookup(connection).cloned()
        };
        let Some(client) = client else {
            return;
        };

        if let Err(e) = self.gate.submit(&client, &command).await {
            debug!(connection = %connection, command = command.kind(), error = %e,
                   "control command rejected");
            self.sink
                .send(
                    connection,
                    ServerMessage::ControlFailed {
                        command: command.kind().to_string(),
                        reason: e.to_string(),
                    },
                )
                .await;
        }
    }

    // ── Signaling relay ───────────────────────────────────────────────────────

    /// Forwards a signaling payload to its addressee.  Deliberately a pure
    /// pass-through: no membership check, no payload inspection.
    async fn relay(&self, target: ConnectionId, message: ServerMessage) {
        self.sink.send(target, message).await;
    }

    // ── Query surface ─────────────────────────────────────────────────────────

    /// Summaries of every active room.
    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let state = self.sessions.lock().await;
        state.rooms.list().into_iter().map(Into::into).collect()
    }

    /// Summary of one room, or `None` if it does not exist.
    pub async fn room_stats(&self, room_id: &str) -> Option<RoomSummary> {
        let state = self.sessions.lock().await;
        state.rooms.stats(room_id).map(Into::into)
    }

    /// Liveness snapshot: uptime plus connection and room counts.
    pub async fn health(&self) -> ServerMessage {
        let state = self.sessions.lock().await;
        ServerMessage::Health {
            uptime_secs: self.started_at.elapsed().as_secs(),
            connection_count: state.directory.connection_count(),
            room_count: state.rooms.room_count(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use uuid::Uuid;

    use screenroom_core::{MouseButton, ScreenSize};

    // ── Test doubles ──────────────────────────────────────────────────────────

    struct StaticCapturer;

    #[async_trait]
    impl ScreenCapturer for StaticCapturer {
        async fn capture(&self, _quality: u8) -> Result<Vec<u8>, String> {
            Ok(vec![0xAB])
        }
    }

    /// Accepts every injection call at a 1920x1080 screen.
    struct StubInjector;

    #[async_trait]
    impl InputInjector for StubInjector {
        fn screen_size(&self) -> ScreenSize {
            ScreenSize {
                width: 1920,
                height: 1080,
            }
        }

        async fn move_mouse(&self, _x: i32, _y: i32) -> Result<(), String> {
            Ok(())
        }

        async fn click(&self, _button: MouseButton, _double: bool) -> Result<(), String> {
            Ok(())
        }

        async fn key_tap(
            &self,
            _key: &str,
            _modifiers: &[screenroom_core::KeyModifier],
        ) -> Result<(), String> {
            Ok(())
        }

        async fn scroll(&self, _amount: i32) -> Result<(), String> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: StdMutex<Vec<(ConnectionId, ServerMessage)>>,
    }

    impl RecordingSink {
        fn sent_to(&self, target: ConnectionId) -> Vec<ServerMessage> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, _)| *id == target)
                .map(|(_, msg)| msg.clone())
                .collect()
        }

        fn last_to(&self, target: ConnectionId) -> ServerMessage {
            self.sent_to(target)
                .pop()
                .expect("a message should have been sent")
        }
    }

    #[async_trait]
    impl OutboundSink for RecordingSink {
        async fn send(&self, target: ConnectionId, message: ServerMessage) {
            self.sent.lock().unwrap().push((target, message));
        }
    }

    fn orchestrator() -> (SessionOrchestrator, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let orchestrator = SessionOrchestrator::new(
            Arc::new(StaticCapturer),
            Arc::new(StubInjector),
            Arc::clone(&sink) as Arc<dyn OutboundSink>,
            RateLimitScope::PerConnection,
            Duration::ZERO,
        );
        (orchestrator, sink)
    }

    async fn host_in_room(
        orchestrator: &SessionOrchestrator,
        room_id: &str,
    ) -> ConnectionId {
        let host = Uuid::new_v4();
        orchestrator.connect(host).await;
        orchestrator
            .handle_message(
                host,
                ClientMessage::JoinAsHost {
                    room_id: room_id.to_string(),
                    settings: None,
                },
            )
            .await;
        host
    }

    async fn viewer_in_room(
        orchestrator: &SessionOrchestrator,
        room_id: &str,
    ) -> ConnectionId {
        let viewer = Uuid::new_v4();
        orchestrator.connect(viewer).await;
        orchestrator
            .handle_message(
                viewer,
                ClientMessage::JoinAsViewer {
                    room_id: room_id.to_string(),
                },
            )
            .await;
        viewer
    }

    // ── Host join ─────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_host_join_creates_room_and_starts_broadcast() {
        let (orchestrator, sink) = orchestrator();

        let host = host_in_room(&orchestrator, "demo").await;

        match sink.last_to(host) {
            ServerMessage::HostJoined {
                room_id,
                settings,
                screen_size,
            } => {
                assert_eq!(room_id, "demo");
                assert_eq!(settings.quality, 60);
                assert_eq!(settings.fps, 10);
                assert_eq!(screen_size.width, 1920);
            }
            other => panic!("expected HostJoined, got {other:?}"),
        }
        assert!(orchestrator.scheduler.is_running("demo"));
        orchestrator.scheduler.stop("demo");
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_join_clamps_requested_settings() {
        let (orchestrator, sink) = orchestrator();
        let host = Uuid::new_v4();
        orchestrator.connect(host).await;

        orchestrator
            .handle_message(
                host,
                ClientMessage::JoinAsHost {
                    room_id: "demo".to_string(),
                    settings: Some(SettingsPatch {
                        quality: Some(500),
                        fps: Some(0),
                    }),
                },
            )
            .await;

        match sink.last_to(host) {
            ServerMessage::HostJoined { settings, .. } => {
                assert_eq!(settings.quality, 100);
                assert_eq!(settings.fps, 1);
            }
            other => panic!("expected HostJoined, got {other:?}"),
        }
        orchestrator.scheduler.stop("demo");
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_host_for_same_room_gets_an_error() {
        let (orchestrator, sink) = orchestrator();
        let _first = host_in_room(&orchestrator, "demo").await;

        let second = Uuid::new_v4();
        orchestrator.connect(second).await;
        orchestrator
            .handle_message(
                second,
                ClientMessage::JoinAsHost {
                    room_id: "demo".to_string(),
                    settings: None,
                },
            )
            .await;

        match sink.last_to(second) {
            ServerMessage::Error { message } => {
                assert!(message.contains("already exists"), "got: {message}");
            }
            other => panic!("expected Error, got {other:?}"),
        }
        orchestrator.scheduler.stop("demo");
    }

    // ── Viewer join ───────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_viewer_join_notifies_viewer_and_host() {
        let (orchestrator, sink) = orchestrator();
        let host = host_in_room(&orchestrator, "demo").await;

        let viewer = viewer_in_room(&orchestrator, "demo").await;

        assert!(matches!(
            sink.last_to(viewer),
            ServerMessage::ViewerJoined { .. }
        ));
        match sink.last_to(host) {
            ServerMessage::ViewerConnected {
                viewer_id,
                viewer_count,
            } => {
                assert_eq!(viewer_id, viewer);
                assert_eq!(viewer_count, 1);
            }
            other => panic!("expected ViewerConnected, got {other:?}"),
        }
        orchestrator.scheduler.stop("demo");
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewer_join_unknown_room_gets_specific_error() {
        let (orchestrator, sink) = orchestrator();
        let viewer = Uuid::new_v4();
        orchestrator.connect(viewer).await;

        orchestrator
            .handle_message(
                viewer,
                ClientMessage::JoinAsViewer {
                    room_id: "ghost".to_string(),
                },
            )
            .await;

        assert_eq!(
            sink.last_to(viewer),
            ServerMessage::Error {
                message: "Room not found or no active host".to_string()
            }
        );
    }

    // ── Settings ──────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_settings_update_fans_out_to_host_and_viewers() {
        let (orchestrator, sink) = orchestrator();
        let host = host_in_room(&orchestrator, "demo").await;
        let viewer = viewer_in_room(&orchestrator, "demo").await;

        orchestrator
            .handle_message(
                host,
                ClientMessage::UpdateSettings {
                    settings: SettingsPatch {
                        quality: Some(80),
                        fps: None,
                    },
                },
            )
            .await;

        let expected = ServerMessage::SettingsUpdated {
            quality: 80,
            fps: 10,
        };
        assert_eq!(sink.last_to(host), expected);
        assert_eq!(sink.last_to(viewer), expected);
        assert!(orchestrator.scheduler.is_running("demo"));
        orchestrator.scheduler.stop("demo");
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_update_by_viewer_is_rejected() {
        let (orchestrator, sink) = orchestrator();
        let _host = host_in_room(&orchestrator, "demo").await;
        let viewer = viewer_in_room(&orchestrator, "demo").await;

        orchestrator
            .handle_message(
                viewer,
                ClientMessage::UpdateSettings {
                    settings: SettingsPatch {
                        quality: Some(10),
                        fps: None,
                    },
                },
            )
            .await;

        assert!(matches!(sink.last_to(viewer), ServerMessage::Error { .. }));
        let stats = orchestrator.room_stats("demo").await.unwrap();
        assert_eq!(stats.settings.quality, 60, "settings must be unchanged");
        orchestrator.scheduler.stop("demo");
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_update_without_a_room_is_rejected() {
        let (orchestrator, sink) = orchestrator();
        let loner = Uuid::new_v4();
        orchestrator.connect(loner).await;

        orchestrator
            .handle_message(
                loner,
                ClientMessage::UpdateSettings {
                    settings: SettingsPatch {
                        quality: Some(50),
                        fps: None,
                    },
                },
            )
            .await;

        assert_eq!(
            sink.last_to(loner),
            ServerMessage::Error {
                message: "not currently in a room".to_string()
            }
        );
    }

    // ── Disconnect cascade ────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_host_disconnect_tears_down_room_and_notifies_viewers() {
        let (orchestrator, sink) = orchestrator();
        let host = host_in_room(&orchestrator, "demo").await;
        let v1 = viewer_in_room(&orchestrator, "demo").await;
        let v2 = viewer_in_room(&orchestrator, "demo").await;

        orchestrator.disconnect(host).await;

        assert_eq!(sink.last_to(v1), ServerMessage::HostDisconnected);
        assert_eq!(sink.last_to(v2), ServerMessage::HostDisconnected);
        assert!(orchestrator.room_stats("demo").await.is_none());
        assert!(!orchestrator.scheduler.is_running("demo"));

        // Evicted viewers are detached, not disconnected: they may host or
        // join another room on the same connection.
        orchestrator
            .handle_message(
                v1,
                ClientMessage::JoinAsHost {
                    room_id: "demo".to_string(),
                    settings: None,
                },
            )
            .await;
        assert!(matches!(sink.last_to(v1), ServerMessage::HostJoined { .. }));
        orchestrator.scheduler.stop("demo");
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewer_disconnect_notifies_host_with_count() {
        let (orchestrator, sink) = orchestrator();
        let host = host_in_room(&orchestrator, "demo").await;
        let viewer = viewer_in_room(&orchestrator, "demo").await;

        orchestrator.disconnect(viewer).await;

        match sink.last_to(host) {
            ServerMessage::ViewerDisconnected {
                viewer_id,
                viewer_count,
            } => {
                assert_eq!(viewer_id, viewer);
                assert_eq!(viewer_count, 0);
            }
            other => panic!("expected ViewerDisconnected, got {other:?}"),
        }
        assert!(
            orchestrator.room_stats("demo").await.is_some(),
            "room must survive a viewer leaving"
        );
        orchestrator.scheduler.stop("demo");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_of_unknown_connection_is_a_noop() {
        let (orchestrator, sink) = orchestrator();

        orchestrator.disconnect(Uuid::new_v4()).await;

        assert!(sink.sent.lock().unwrap().is_empty());
    }

    // ── Remote control ────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_host_control_command_soft_fails() {
        let (orchestrator, sink) = orchestrator();
        let host = host_in_room(&orchestrator, "demo").await;

        orchestrator
            .handle_message(
                host,
                ClientMessage::RemoteControl {
                    command: ControlCommand::Move { x: 5, y: 5 },
                },
            )
            .await;

        match sink.last_to(host) {
            ServerMessage::ControlFailed { command, reason } => {
                assert_eq!(command, "move");
                assert!(reason.contains("viewers"), "got: {reason}");
            }
            other => panic!("expected ControlFailed, got {other:?}"),
        }
        orchestrator.scheduler.stop("demo");
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewer_control_command_is_accepted_silently() {
        let (orchestrator, sink) = orchestrator();
        let _host = host_in_room(&orchestrator, "demo").await;
        let viewer = viewer_in_room(&orchestrator, "demo").await;
        let before = sink.sent_to(viewer).len();

        orchestrator
            .handle_message(
                viewer,
                ClientMessage::RemoteControl {
                    command: ControlCommand::Move { x: 5, y: 5 },
                },
            )
            .await;

        // Success is silent: no reply of any kind for an accepted command.
        assert_eq!(sink.sent_to(viewer).len(), before);
        orchestrator.scheduler.stop("demo");
    }

    // ── Signaling relay ───────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_offer_is_relayed_with_sender_attached() {
        let (orchestrator, sink) = orchestrator();
        let host = host_in_room(&orchestrator, "demo").await;
        let viewer = viewer_in_room(&orchestrator, "demo").await;

        let payload = serde_json::json!({"sdp": "v=0", "type": "offer"});
        orchestrator
            .handle_message(
                host,
                ClientMessage::Offer {
                    target: viewer,
                    offer: payload.clone(),
                },
            )
            .await;

        assert_eq!(
            sink.last_to(viewer),
            ServerMessage::Offer {
                sender: host,
                offer: payload
            }
        );
        orchestrator.scheduler.stop("demo");
    }

    // ── Query surface ─────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_list_rooms_reports_active_rooms() {
        let (orchestrator, sink) = orchestrator();
        let _host = host_in_room(&orchestrator, "alpha").await;
        let _viewer = viewer_in_room(&orchestrator, "alpha").await;

        let asker = Uuid::new_v4();
        orchestrator.connect(asker).await;
        orchestrator.handle_message(asker, ClientMessage::ListRooms).await;

        match sink.last_to(asker) {
            ServerMessage::RoomList { rooms } => {
                assert_eq!(rooms.len(), 1);
                assert_eq!(rooms[0].room_id, "alpha");
                assert_eq!(rooms[0].viewer_count, 1);
            }
            other => panic!("expected RoomList, got {other:?}"),
        }
        orchestrator.scheduler.stop("alpha");
    }

    #[tokio::test(start_paused = true)]
    async fn test_room_stats_for_unknown_room_is_an_error() {
        let (orchestrator, sink) = orchestrator();
        let asker = Uuid::new_v4();
        orchestrator.connect(asker).await;

        orchestrator
            .handle_message(
                asker,
                ClientMessage::RoomStats {
                    room_id: "ghost".to_string(),
                },
            )
            .await;

        assert!(matches!(sink.last_to(asker), ServerMessage::Error { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_counts_connections_and_rooms() {
        let (orchestrator, sink) = orchestrator();
        let _host = host_in_room(&orchestrator, "demo").await;
        let _viewer = viewer_in_room(&orchestrator, "demo").await;

        let asker = Uuid::new_v4();
        orchestrator.connect(asker).await;
        orchestrator.handle_message(asker, ClientMessage::Health).await;

        match sink.last_to(asker) {
            ServerMessage::Health {
                connection_count,
                room_count,
                ..
            } => {
                assert_eq!(connection_count, 3);
                assert_eq!(room_count, 1);
            }
            other => panic!("expected Health, got {other:?}"),
        }
        orchestrator.scheduler.stop("demo");
    }
}
