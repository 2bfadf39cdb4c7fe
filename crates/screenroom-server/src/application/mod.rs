//! Application layer: the session & broadcast orchestration core.
//!
//! Everything here depends only on domain types and on traits
//! ([`broadcast::ScreenCapturer`], [`control_gate::InputInjector`],
//! [`orchestrator::OutboundSink`]); infrastructure implementations are
//! injected at construction time, so the whole layer is unit-testable
//! without sockets or a display.

pub mod broadcast;
pub mod client_directory;
pub mod control_gate;
pub mod orchestrator;
pub mod rate_limit;
pub mod room_registry;

pub use broadcast::{BroadcastScheduler, ScreenCapturer, SchedulerError};
pub use client_directory::{Client, ClientDirectory};
pub use control_gate::{ControlError, InputInjector, RemoteControlGate};
pub use orchestrator::{OutboundSink, SessionOrchestrator, SessionState};
pub use rate_limit::{RateLimitScope, RateLimiter};
pub use room_registry::{Departure, RegistryError, RoomRegistry, RoomStats};
