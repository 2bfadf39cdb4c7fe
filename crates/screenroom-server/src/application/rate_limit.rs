//! RateLimiter: minimum spacing between accepted control commands.
//!
//! Protects the host's input subsystem from a malicious or buggy viewer
//! flooding it with events.  The original design was ambiguous about whether
//! the 10 ms gate is global or per sender, so the scope is a configurable
//! policy ([`RateLimitScope`]); the default is per-connection, the narrower
//! and more defensible interpretation.
//!
//! State is one last-accepted timestamp per key.  It resets implicitly with
//! time; the per-connection entry is dropped when the connection goes away.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use screenroom_core::ConnectionId;

/// Minimum spacing between accepted commands when the config does not say
/// otherwise.
pub const DEFAULT_COMMAND_SPACING: Duration = Duration::from_millis(10);

/// Which actuation channel a command competes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitScope {
    /// Each connection has its own gate (default).
    #[default]
    PerConnection,
    /// All viewers of one room share a gate.
    PerRoom,
    /// One gate for the whole process.
    Global,
}

/// Error returned when a command arrives before the minimum spacing elapsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("command rate limit exceeded")]
pub struct RateLimited;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RateKey {
    Global,
    Connection(ConnectionId),
    Room(String),
}

/// Enforces a minimum interval between accepted commands per [`RateLimitScope`].
#[derive(Debug)]
pub struct RateLimiter {
    scope: RateLimitScope,
    min_spacing: Duration,
    last_accepted: HashMap<RateKey, Instant>,
}

impl RateLimiter {
    pub fn new(scope: RateLimitScope, min_spacing: Duration) -> Self {
        Self {
            scope,
            min_spacing,
            last_accepted: HashMap::new(),
        }
    }

    /// Records an accepted command if enough time has passed on the relevant
    /// channel, rejecting it otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimited`] when the elapsed time since the last accepted
    /// command on this channel is below the minimum spacing.  A rejected
    /// command does not update the timestamp — only accepted commands count.
    pub fn check(&mut self, connection: ConnectionId, room_id: &str) -> Result<(), RateLimited> {
        self.check_at(Instant::now(), connection, room_id)
    }

    /// Drops per-connection state when a connection disconnects.
    pub fn forget_connection(&mut self, connection: ConnectionId) {
        self.last_accepted.remove(&RateKey::Connection(connection));
    }

    fn check_at(
        &mut self,
        now: Instant,
        connection: ConnectionId,
        room_id: &str,
    ) -> Result<(), RateLimited> {
        let key = match self.scope {
            RateLimitScope::PerConnection => RateKey::Connection(connection),
            RateLimitScope::PerRoom => RateKey::Room(room_id.to_string()),
            RateLimitScope::Global => RateKey::Global,
        };

        if let Some(last) = self.last_accepted.get(&key) {
            if now.duration_since(*last) < self.min_spacing {
                return Err(RateLimited);
            }
        }
        self.last_accepted.insert(key, now);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
