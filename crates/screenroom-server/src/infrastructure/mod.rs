//! Infrastructure layer: everything that touches the outside world.
//!
//! - `config`    – TOML configuration file loading.
//! - `capture`   – screen capture backends ([`ScreenCapturer`] impls).
//! - `injection` – input injection backends ([`InputInjector`] impls).
//! - `ws_server` – the WebSocket accept loop and per-connection tasks.
//!
//! [`ScreenCapturer`]: crate::application::ScreenCapturer
//! [`InputInjector`]: crate::application::InputInjector

pub mod capture;
pub mod config;
pub mod injection;
pub mod ws_server;

pub use capture::TestPatternCapturer;
pub use config::{load_config, ServerConfig};
pub use injection::LoggingInjector;
pub use ws_server::{run_server, WsSink};
