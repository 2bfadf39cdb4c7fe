//! Input injection backends.
//!
//! The application layer only knows the [`InputInjector`] trait; this module
//! provides the built-in backend.  Platform backends (X11 XTest, Windows
//! SendInput, macOS CGEvent) implement the same trait.

use async_trait::async_trait;
use tracing::info;

use screenroom_core::{KeyModifier, MouseButton, ScreenSize};

use crate::application::InputInjector;

/// Injector that logs every command instead of synthesizing OS input.
///
/// Used on headless servers and during development: the full admission
/// pipeline (authorization, rate limiting, bounds) runs against a configured
/// virtual screen, and each accepted command is visible in the logs.
#[derive(Debug)]
pub struct LoggingInjector {
    screen: ScreenSize,
}

impl LoggingInjector {
    pub fn new(screen: ScreenSize) -> Self {
        Self { screen }
    }
}

#[async_trait]
impl InputInjector for LoggingInjector {
    fn screen_size(&self) -> ScreenSize {
        self.screen
    }

    async fn move_mouse(&self, x: i32, y: i32) -> Result<(), String> {
        info!(x, y, "inject: move mouse");
        Ok(())
    }

    async fn click(&self, button: MouseButton, double: bool) -> Result<(), String> {
        info!(?button, double, "inject: click");
        Ok(())
    }

    async fn key_tap(&self, key: &str, modifiers: &[KeyModifier]) -> Result<(), String> {
        info!(key, ?modifiers, "inject: key tap");
        Ok(())
    }

    async fn scroll(&self, amount: i32) -> Result<(), String> {
        info!(amount, "inject: scroll");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
