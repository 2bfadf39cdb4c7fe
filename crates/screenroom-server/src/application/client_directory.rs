//! ClientDirectory: the in-memory record of every live connection.
//!
//! Each connected WebSocket gets exactly one [`Client`] entry, created when
//! the transport accepts the connection and destroyed when it closes.  The
//! entry tracks the connection's role (`unassigned`/`host`/`viewer`) and its
//! current room, which is what the orchestrator consults to authorize
//! settings updates and remote-control commands.
//!
//! The directory never performs I/O; it is plain in-memory mutation guarded
//! by the orchestrator's session lock (see `orchestrator.rs`).

use std::collections::HashMap;
use std::time::Instant;

use screenroom_core::{ClientRole, ConnectionId};

/// Runtime state for one live connection.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: ConnectionId,
    pub role: ClientRole,
    /// The room this connection belongs to, if any.  Invariant: `Some` implies
    /// the room exists in the registry and lists this connection as its host
    /// or one of its viewers.
    pub room_id: Option<String>,
    pub connected_at: Instant,
    pub last_activity: Instant,
}

/// In-memory directory of all live connections.
///
/// A `HashMap<ConnectionId, Client>` gives O(1) lookup by connection id.
/// Iteration order is irrelevant; nothing enumerates the directory except
/// the health snapshot's count.
#[derive(Debug, Default)]
pub struct ClientDirectory {
    clients: HashMap<ConnectionId, Client>,
}

impl ClientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record for a freshly accepted connection.
    ///
    /// Connection ids are assigned by the transport at accept time and are
    /// assumed fresh, so there is no upsert semantics here.
    pub fn register(&mut self, id: ConnectionId) {
        let now = Instant::now();
        self.clients.insert(
            id,
            Client {
                id,
                role: ClientRole::Unassigned,
                room_id: None,
                connected_at: now,
                last_activity: now,
            },
        );
    }

    /// Assigns a role and room to a connection.
    ///
    /// No-op if the connection is unknown; callers that need to distinguish
    /// must [`lookup`](Self::lookup) first.
    pub fn assign_role(&mut self, id: ConnectionId, role: ClientRole, room_id: Option<String>) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.role = role;
            client.room_id = room_id;
        }
    }

    /// Returns the record for a connection, or `None` if unknown.
    pub fn lookup(&self, id: ConnectionId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Bumps the last-activity timestamp for a connection.
    pub fn touch(&mut self, id: ConnectionId) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.last_activity = Instant::now();
        }
    }

    /// Deletes a record, returning the last-known snapshot.
    ///
    /// The snapshot lets the caller perform teardown notifications *after*
    /// the record is gone, so a concurrent teardown path cannot observe the
    /// connection and tear it down a second time.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Client> {
        self.clients.remove(&id)
    }

    /// Number of live connections, for the health snapshot.
    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
