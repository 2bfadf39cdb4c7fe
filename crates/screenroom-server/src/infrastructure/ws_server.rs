//! WebSocket server: accept loop and per-connection task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from browsers.
//! 3. Upgrading each connection to a WebSocket session and assigning it a
//!    fresh connection id.
//! 4. Running two tasks per connection:
//!    - **Reader**: decodes inbound JSON frames into [`ClientMessage`] values
//!      and hands them to the orchestrator.
//!    - **Writer**: drains the connection's outbound channel and writes each
//!      [`ServerMessage`] as a JSON text frame.
//! 5. Telling the orchestrator about connection open/close, so session state
//!    always mirrors the live socket set.
//! 6. Gracefully shutting down when the `running` flag is cleared.
//!
//! # Scalability
//!
//! Each connection runs in its own Tokio task; the accept loop never blocks
//! on a session.  Outbound delivery goes through a per-connection mpsc
//! channel, so the orchestrator (and the broadcast tasks behind it) write to
//! a channel rather than a socket and never hold the session lock across
//! socket I/O.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use screenroom_core::{ClientMessage, ConnectionId, ServerMessage};

use crate::application::{OutboundSink, SessionOrchestrator};
use crate::infrastructure::config::ServerConfig;

/// Capacity of each connection's outbound channel.  A connection that falls
/// this many messages behind stalls only its own broadcast deliveries.
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

// ── Outbound sink ─────────────────────────────────────────────────────────────

/// Routes [`ServerMessage`]s to per-connection outbound channels.
///
/// The transport registers a sender when a connection is accepted and removes
/// it when the connection closes.  Delivery to an unknown connection id is
/// silently dropped: the orchestrator may legitimately address a connection
/// that disconnected a moment ago.
#[derive(Default)]
pub struct WsSink {
    senders: tokio::sync::Mutex<HashMap<ConnectionId, mpsc::Sender<ServerMessage>>>,
}

impl WsSink {
    pub fn new() -> Self {
        Self::default()
    }

    async fn register(&self, id: ConnectionId, sender: mpsc::Sender<ServerMessage>) {
        self.senders.lock().await.insert(id, sender);
    }

    async fn deregister(&self, id: ConnectionId) {
        self.senders.lock().await.remove(&id);
    }
}

#[async_trait]
impl OutboundSink for WsSink {
    async fn send(&self, target: ConnectionId, message: ServerMessage) {
        // Clone the sender out of the map so the registry lock is not held
        // while awaiting channel capacity.
        let sender = self.senders.lock().await.get(&target).cloned();
        match sender {
            Some(sender) => {
                if sender.send(message).await.is_err() {
                    debug!(target = %target, "outbound channel closed; message dropped");
                }
            }
            None => {
                debug!(target = %target, "no such connection; message dropped");
            }
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Runs the main WebSocket accept loop until `running` is set to `false`.
///
/// Binds a TCP listener on the configured address and accepts incoming
/// connections in a loop.  Each accepted connection is handed off to a
/// dedicated Tokio task so that one slow client never blocks others.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(
    config: ServerConfig,
    orchestrator: Arc<SessionOrchestrator>,
    sink: Arc<WsSink>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let bind_addr = format!("{}:{}", config.network.bind_address, config.network.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {bind_addr}"))?;

    info!("WebSocket server listening on {bind_addr}");

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Use a short timeout on `accept()` so the loop can periodically
        // check the `running` flag even when no clients are connecting.
        let accept_result = timeout(Duration::from_millis(200), listener.accept()).await;

        match accept_result {
            Ok(Ok((stream, peer_addr))) => {
                info!("new connection from {peer_addr}");
                let orchestrator = Arc::clone(&orchestrator);
                let sink = Arc::clone(&sink);
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, orchestrator, sink).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file
                // descriptors).  Log it and continue rather than crashing.
                error!("accept error: {e}");
            }
            Err(_) => {
                // Timeout: no new connection in the last 200 ms.  Loop back
                // to check the `running` flag.
            }
        }
    }

    Ok(())
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Top-level handler for a single WebSocket connection.
///
/// Wraps [`run_connection`] and logs the outcome, so `run_connection` can use
/// `?` for clean error propagation.
async fn handle_connection(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    orchestrator: Arc<SessionOrchestrator>,
    sink: Arc<WsSink>,
) {
    match run_connection(raw_stream, peer_addr, orchestrator, sink).await {
        Ok(()) => info!("connection {peer_addr} closed normally"),
        Err(e) => warn!("connection {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of a single WebSocket connection.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails.
async fn run_connection(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    orchestrator: Arc<SessionOrchestrator>,
    sink: Arc<WsSink>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    // The connection id is assigned here, at accept time, and is what every
    // layer above uses to address this client.
    let id: ConnectionId = Uuid::new_v4();
    info!(connection = %id, peer = %peer_addr, "WebSocket session established");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CHANNEL_CAPACITY);

    sink.register(id, out_tx).await;
    orchestrator.connect(id).await;

    // Writer task: drains the outbound channel into the socket.  Ends when
    // the channel closes (deregistration drops the last sender) or the
    // socket rejects a write.
    let writer_id = id;
    let writer_task = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if ws_tx.send(WsMessage::Text(json)).await.is_err() {
                        debug!(connection = %writer_id, "WebSocket send failed (client disconnected)");
                        break;
                    }
                }
                Err(e) => {
                    error!(connection = %writer_id, "JSON serialization error: {e}");
                }
            }
        }
    });

    // Reader loop: decode inbound frames and dispatch them.
    loop {
        let ws_msg = match ws_rx.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                debug!(connection = %id, "WebSocket closed normally");
                break;
            }
            Some(Err(e)) => {
                warn!(connection = %id, "WebSocket error: {e}");
                break;
            }
            None => {
                debug!(connection = %id, "stream ended");
                break;
            }
        };

        match ws_msg {
            WsMessage::Text(json) => {
                let message: ClientMessage = match serde_json::from_str(&json) {
                    Ok(m) => m,
                    Err(e) => {
                        // One bad message must not end the session; the
                        // client may retry on the next interaction.
                        warn!(connection = %id, "invalid JSON from client: {e}");
                        sink.send(
                            id,
                            ServerMessage::Error {
                                message: "invalid message format".to_string(),
                            },
                        )
                        .await;
                        continue;
                    }
                };
                orchestrator.handle_message(id, message).await;
            }

            WsMessage::Binary(_) => {
                // The protocol is JSON-only; binary frames are unexpected.
                warn!(connection = %id, "unexpected binary WebSocket frame (ignored)");
            }

            WsMessage::Ping(data) => {
                // Protocol-level ping; tokio-tungstenite queues the Pong
                // automatically on the next sink write.
                debug!(connection = %id, "WebSocket ping ({} bytes)", data.len());
            }

            WsMessage::Pong(_) => {
                debug!(connection = %id, "WebSocket pong received");
            }

            WsMessage::Close(_) => {
                debug!(connection = %id, "WebSocket Close frame received");
                break;
            }

            WsMessage::Frame(_) => {
                debug!(connection = %id, "raw frame (ignored)");
            }
        }
    }

    // Teardown order matters: the orchestrator's disconnect cascade may
    // still address *other* connections through the sink, but this one must
    // stop receiving first so no post-close message is queued for it.
    sink.deregister(id).await;
    orchestrator.disconnect(id).await;
    writer_task.abort();

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
