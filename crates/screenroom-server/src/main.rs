//! ScreenRoom server — entry point.
//!
//! One process hosts the whole screen-sharing service: the WebSocket
//! listener, the session orchestrator, the per-room broadcast tasks, and the
//! built-in capture/injection backends.
//!
//! # Usage
//!
//! ```text
//! screenroom-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>              TOML config file [default: screenroom.toml]
//!   --bind <ADDR>                Listener bind address (overrides config)
//!   --port <PORT>                Listener port (overrides config)
//!   --command-spacing-ms <MS>    Remote-control spacing (overrides config)
//!   --screen-width <PX>          Virtual screen width (overrides config)
//!   --screen-height <PX>         Virtual screen height (overrides config)
//! ```
//!
//! # Environment variable overrides
//!
//! Each flag can also be set via `SCREENROOM_*` environment variables
//! (`SCREENROOM_PORT`, `SCREENROOM_BIND`, ...); CLI args take precedence.
//! Log verbosity is controlled by `RUST_LOG` (e.g. `RUST_LOG=debug`).
//!
//! # Precedence
//!
//! CLI flag > environment variable > config file > built-in default.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use screenroom_server::application::{OutboundSink, SessionOrchestrator};
use screenroom_server::infrastructure::{
    load_config, run_server, LoggingInjector, ServerConfig, TestPatternCapturer, WsSink,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// ScreenRoom screen-sharing server.
///
/// Hosts create rooms, viewers watch a periodic frame broadcast and may send
/// remote-control input back, all over one JSON WebSocket protocol.
#[derive(Debug, Parser)]
#[command(
    name = "screenroom-server",
    about = "WebSocket screen-sharing session and broadcast server",
    version
)]
struct Cli {
    /// Path to the TOML config file.  A missing file is not an error; the
    /// built-in defaults apply.
    #[arg(long, default_value = "screenroom.toml", env = "SCREENROOM_CONFIG")]
    config: PathBuf,

    /// IP address to bind the WebSocket listener to.
    #[arg(long, env = "SCREENROOM_BIND")]
    bind: Option<String>,

    /// TCP port for the WebSocket listener.
    #[arg(long, env = "SCREENROOM_PORT")]
    port: Option<u16>,

    /// Minimum milliseconds between accepted remote-control commands.
    #[arg(long, env = "SCREENROOM_COMMAND_SPACING_MS")]
    command_spacing_ms: Option<u64>,

    /// Virtual screen width reported by the built-in injector.
    #[arg(long, env = "SCREENROOM_SCREEN_WIDTH")]
    screen_width: Option<u32>,

    /// Virtual screen height reported by the built-in injector.
    #[arg(long, env = "SCREENROOM_SCREEN_HEIGHT")]
    screen_height: Option<u32>,
}

impl Cli {
    /// Applies CLI/env overrides on top of the file-based configuration.
    fn apply_to(&self, config: &mut ServerConfig) {
        if let Some(bind) = &self.bind {
            config.network.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(spacing) = self.command_spacing_ms {
            config.control.command_spacing_ms = spacing;
        }
        if let Some(width) = self.screen_width {
            config.screen.width = width;
        }
        if let Some(height) = self.screen_height {
            config.screen.height = height;
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    cli.apply_to(&mut config);

    info!(
        "ScreenRoom server starting — bind={}:{}, screen={}x{}, spacing={}ms",
        config.network.bind_address,
        config.network.port,
        config.screen.width,
        config.screen.height,
        config.control.command_spacing_ms
    );

    // Graceful shutdown flag, cleared by the Ctrl+C handler.  The accept
    // loop checks it every 200 ms and exits cleanly.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // Wire the layers together.  The sink is shared between the transport
    // (which registers connections) and the orchestrator (which sends
    // through it).
    let sink = Arc::new(WsSink::new());
    let orchestrator = Arc::new(SessionOrchestrator::new(
        Arc::new(TestPatternCapturer::new()),
        Arc::new(LoggingInjector::new(config.screen.size())),
        Arc::clone(&sink) as Arc<dyn OutboundSink>,
        config.control.rate_limit_scope,
        Duration::from_millis(config.control.command_spacing_ms),
    ));

    run_server(config, orchestrator, sink, running).await?;

    info!("ScreenRoom server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_config_path() {
        let cli = Cli::parse_from(["screenroom-server"]);
        assert_eq!(cli.config, PathBuf::from("screenroom.toml"));
    }

    #[test]
    fn test_cli_overrides_default_to_none() {
        let cli = Cli::parse_from(["screenroom-server"]);
        assert_eq!(cli.bind, None);
        assert_eq!(cli.port, None);
        assert_eq!(cli.command_spacing_ms, None);
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["screenroom-server", "--port", "9999"]);
        assert_eq!(cli.port, Some(9999));
    }

    #[test]
    fn test_apply_to_keeps_config_when_no_overrides() {
        let cli = Cli::parse_from(["screenroom-server"]);
        let mut config = ServerConfig::default();

        cli.apply_to(&mut config);

        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_apply_to_overrides_only_named_fields() {
        let cli = Cli::parse_from([
            "screenroom-server",
            "--port",
            "8080",
            "--screen-width",
            "2560",
        ]);
        let mut config = ServerConfig::default();

        cli.apply_to(&mut config);

        assert_eq!(config.network.port, 8080);
        assert_eq!(config.screen.width, 2560);
        // Untouched fields keep their file/default values.
        assert_eq!(config.network.bind_address, "0.0.0.0");
        assert_eq!(config.screen.height, 1080);
    }

    #[test]
    fn test_apply_to_command_spacing_override() {
        let cli = Cli::parse_from(["screenroom-server", "--command-spacing-ms", "25"]);
        let mut config = ServerConfig::default();

        cli.apply_to(&mut config);

        assert_eq!(config.control.command_spacing_ms, 25);
    }
}
