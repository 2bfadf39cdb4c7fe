//! RemoteControlGate: admission control for inbound remote-control commands.
//!
//! Converts a structured [`ControlCommand`] from a viewer into a validated
//! call against the input-injection collaborator, with defense against
//! malformed or abusive input:
//!
//! - **Authorization** — only connections with role `viewer` (and a room) may
//!   inject input; a host never controls its own room.
//! - **Rate limiting** — commands below the minimum spacing are rejected
//!   (see [`RateLimiter`]).
//! - **Bounds checking** — move/scroll coordinates must lie within the host
//!   screen, inclusive on both edges.  The screen size is obtained from the
//!   injector once at construction.
//!
//! Every failure is a [`ControlError`] value returned to the caller; nothing
//! here panics or propagates an error past the gate.  One bad input event
//! must not destabilize the session, so collaborator failures are caught and
//! reported as soft `control-failed` notifications.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tracing::debug;

use screenroom_core::{ClientRole, ControlCommand, KeyModifier, MouseButton, ScreenSize};

use crate::application::client_directory::Client;
use crate::application::rate_limit::{RateLimitScope, RateLimiter};

/// Discrete scroll unit applied per scroll command, in the direction of the
/// sign of the incoming `deltaY`.
pub const SCROLL_STEP: i32 = 3;

/// Trait for the external input-injection collaborator.
///
/// The gate owns the only reference to this capability (no free-standing
/// global).  Infrastructure implementations talk to the OS input subsystem;
/// test implementations record calls.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InputInjector: Send + Sync {
    /// Pixel dimensions of the host display.  Queried once at gate
    /// construction; coordinate bounds derive from it.
    fn screen_size(&self) -> ScreenSize;

    /// Moves the pointer to absolute coordinates.
    async fn move_mouse(&self, x: i32, y: i32) -> Result<(), String>;

    /// Clicks (or double-clicks) a mouse button at the current position.
    async fn click(&self, button: MouseButton, double: bool) -> Result<(), String>;

    /// Taps a key with the given held modifiers.
    async fn key_tap(&self, key: &str, modifiers: &[KeyModifier]) -> Result<(), String>;

    /// Scrolls by a signed number of discrete units (positive = down).
    async fn scroll(&self, amount: i32) -> Result<(), String>;
}

/// Error type for rejected or failed control commands.
///
/// All variants are soft failures: the orchestrator converts them into a
/// `control-failed` notification to the sender and carries on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("only viewers may send remote-control commands")]
    Unauthorized,
    #[error("command rate limit exceeded")]
    RateLimited,
    #[error("coordinates ({x}, {y}) outside screen bounds {width}x{height}")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    #[error("input injection failed: {0}")]
    Injection(String),
}

/// Validates and authorizes remote-control commands, then forwards them to
/// the injection collaborator.
pub struct RemoteControlGate {
    injector: Arc<dyn InputInjector>,
    limiter: Mutex<RateLimiter>,
    screen: ScreenSize,
}

impl RemoteControlGate {
    /// Builds a gate around the given injector capability.
    ///
    /// The host screen bounds are read from the injector here, once, and
    /// reused for every subsequent bounds check.
    pub fn new(
        injector: Arc<dyn InputInjector>,
        scope: RateLimitScope,
        min_spacing: Duration,
    ) -> Self {
        let screen = injector.screen_size();
        Self {
            injector,
            limiter: Mutex::new(RateLimiter::new(scope, min_spacing)),
            screen,
        }
    }

    /// The host screen bounds, as reported at construction.
    pub fn screen_size(&self) -> ScreenSize {
        self.screen
    }

    /// Validates `command` from `client` and executes it via the injector.
    ///
    /// # Errors
    ///
    /// Returns a [`ControlError`] when the command is rejected (authorization,
    /// rate limit, bounds) or when the injector itself fails.  No injection
    /// call is made for a rejected command.
    pub async fn submit(
        &self,
        client: &Client,
        command: &ControlCommand,
    ) -> Result<(), ControlError> {
        let room_id = match (client.role, client.room_id.as_deref()) {
            (ClientRole::Viewer, Some(room)) => room.to_string(),
            _ => return Err(ControlError::Unauthorized),
        };

        {
            let mut limiter = self.limiter.lock().expect("lock poisoned");
            limiter
                .check(client.id, &room_id)
                .map_err(|_| ControlError::RateLimited)?;
        }

        match command {
            ControlCommand::Move { x, y } => {
                self.check_bounds(*x, *y)?;
                self.injector
                    .move_mouse(*x, *y)
                    .await
                    .map_err(ControlError::Injection)?;
            }
            ControlCommand::Click { button, double } => {
                self.injector
                    .click(*button, *double)
                    .await
                    .map_err(ControlError::Injection)?;
            }
            ControlCommand::KeyPress { key, modifiers } => {
                self.injector
                    .key_tap(key, modifiers)
                    .await
                    .map_err(ControlError::Injection)?;
            }
            ControlCommand::Scroll { x, y, delta_y } => {
                self.check_bounds(*x, *y)?;
                self.injector
                    .move_mouse(*x, *y)
                    .await
                    .map_err(ControlError::Injection)?;
                // Normalize the raw wheel delta to one discrete step in its
                // direction; zero scrolls up, matching the original behavior.
                let amount = if *delta_y > 0 { SCROLL_STEP } else { -SCROLL_STEP };
                self.injector
                    .scroll(amount)
                    .await
                    .map_err(ControlError::Injection)?;
            }
        }

        debug!(viewer = %client.id, command = command.kind(), "control command injected");
        Ok(())
    }

    /// Drops rate-limiter state for a disconnected viewer.
    pub fn forget_connection(&self, connection: screenroom_core::ConnectionId) {
        self.limiter
            .lock()
            .expect("lock poisoned")
            .forget_connection(connection);
    }

    fn check_bounds(&self, x: i32, y: i32) -> Result<(), ControlError> {
        let in_x = x >= 0 && i64::from(x) <= i64::from(self.screen.width);
        let in_y = y >= 0 && i64::from(y) <= i64::from(self.screen.height);
        if in_x && in_y {
            Ok(())
        } else {
            Err(ControlError::OutOfBounds {
                x,
                y,
                width: self.screen.width,
                height: self.screen.height,
            })
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
