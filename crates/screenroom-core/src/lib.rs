//! # screenroom-core
//!
//! Shared library for ScreenRoom containing the browser-facing protocol
//! message types and the domain entities for rooms and clients.
//!
//! This crate is used by the server and by any future native viewer.
//! It has zero dependencies on OS APIs, network sockets, or async runtimes.
//!
//! # Architecture overview
//!
//! ScreenRoom is a screen-sharing server: a "host" connection has its screen
//! captured and broadcast to "viewer" connections in the same room, and an
//! authorized viewer can inject mouse/keyboard input back onto the host
//! machine.  This crate defines:
//!
//! - **`protocol`** – The JSON messages exchanged over WebSocket.  Every
//!   frame is one JSON object discriminated by an `"event"` field.
//!
//! - **`domain`** – Pure business types with no I/O: room settings with
//!   their clamping rules, client roles, and room-id validation.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `screenroom_core::RoomSettings` instead of the full module path.
pub use domain::session::{
    validate_room_id, ClientRole, ConnectionId, RoomIdError, RoomSettings, ScreenSize,
    SettingsPatch,
};
pub use protocol::messages::{
    ClientMessage, ControlCommand, KeyModifier, MouseButton, RoomSummary, ServerMessage,
};
