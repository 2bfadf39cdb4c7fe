//! The JSON-over-WebSocket wire protocol.

pub mod messages;
