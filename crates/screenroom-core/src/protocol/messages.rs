//! JSON message types for the browser-facing WebSocket protocol.
//!
//! Every WebSocket text frame carries one JSON object with an `"event"` field
//! identifying the variant; all other fields are flattened into the same
//! object.  For example:
//!
//! ```json
//! {"event":"join-as-host","roomId":"demo","settings":{"quality":80,"fps":15}}
//! {"event":"remote-control","type":"move","x":100,"y":200}
//! {"event":"screen-frame","frame":"<base64>","timestamp":1712345678901,"quality":60}
//! ```
//!
//! Serde's `#[serde(tag = "event")]` attribute handles the discriminant;
//! remote-control commands carry a second, nested `"type"` discriminant so
//! the four command shapes stay one enum ([`ControlCommand`]).
//!
//! # Why separate client→server and server→client message types?
//!
//! The two directions carry different information: clients *send* join
//! requests and control commands; the server *sends* frames and lifecycle
//! notifications.  Two distinct enums make it a compile-time error to send a
//! server-only message from a client handler, and vice versa.

use serde::{Deserialize, Serialize};

use crate::domain::session::{ConnectionId, RoomSettings, ScreenSize, SettingsPatch};

// ── Remote-control commands ───────────────────────────────────────────────────

/// Mouse buttons accepted from viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
}

/// Keyboard modifiers accepted alongside a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyModifier {
    Control,
    Shift,
    Alt,
    Cmd,
}

/// A structured remote-control command submitted by a viewer.
///
/// # Serde representation
///
/// ```json
/// {"type":"move","x":100,"y":200}
/// {"type":"click","button":"left","double":false}
/// {"type":"key-press","key":"a","modifiers":["control"]}
/// {"type":"scroll","x":100,"y":200,"deltaY":-120}
/// ```
///
/// Coordinates are signed so that out-of-bounds input (e.g. `x: -5`) survives
/// deserialization and can be rejected by the control gate instead of failing
/// at the JSON layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ControlCommand {
    /// Move the host pointer to absolute coordinates.
    Move { x: i32, y: i32 },
    /// Click (or double-click) a mouse button at the current pointer position.
    Click {
        button: MouseButton,
        #[serde(default)]
        double: bool,
    },
    /// Tap a key, optionally with held modifiers.
    KeyPress {
        key: String,
        #[serde(default)]
        modifiers: Vec<KeyModifier>,
    },
    /// Move the pointer to `(x, y)` and scroll one discrete step in the
    /// direction of the sign of `delta_y`.
    Scroll { x: i32, y: i32, delta_y: i32 },
}

impl ControlCommand {
    /// Short name of the command variant, used in `control-failed` replies
    /// and log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlCommand::Move { .. } => "move",
            ControlCommand::Click { .. } => "click",
            ControlCommand::KeyPress { .. } => "key-press",
            ControlCommand::Scroll { .. } => "scroll",
        }
    }
}

// ── Client → Server messages ──────────────────────────────────────────────────

/// All messages a client may send to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Create a room and become its host.  Optional initial settings are
    /// clamped server-side.
    JoinAsHost {
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        settings: Option<SettingsPatch>,
    },

    /// Join an existing room as a viewer.
    JoinAsViewer { room_id: String },

    /// Change the room's broadcast settings (host only, partial update).
    UpdateSettings {
        #[serde(flatten)]
        settings: SettingsPatch,
    },

    /// Inject input on the host machine (authorized viewers only).
    RemoteControl {
        #[serde(flatten)]
        command: ControlCommand,
    },

    /// WebRTC signaling relay: forward an SDP offer to `target`.
    Offer {
        target: ConnectionId,
        offer: serde_json::Value,
    },

    /// WebRTC signaling relay: forward an SDP answer to `target`.
    Answer {
        target: ConnectionId,
        answer: serde_json::Value,
    },

    /// WebRTC signaling relay: forward an ICE candidate to `target`.
    IceCandidate {
        target: ConnectionId,
        candidate: serde_json::Value,
    },

    /// Request the list of active rooms.
    ListRooms,

    /// Request stats for a single room.
    RoomStats { room_id: String },

    /// Request a liveness/health snapshot.
    Health,
}

// ── Server → Client messages ──────────────────────────────────────────────────

/// Summary of one active room, used by the read-only query surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    pub viewer_count: usize,
    pub settings: RoomSettings,
    /// Room creation time as milliseconds since the Unix epoch.
    pub created_at_ms: u64,
}

/// All messages the server may send to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Room created; the sender is now its host.
    HostJoined {
        room_id: String,
        settings: RoomSettings,
        screen_size: ScreenSize,
    },

    /// The sender joined an existing room as a viewer.
    ViewerJoined {
        room_id: String,
        settings: RoomSettings,
        screen_size: ScreenSize,
    },

    /// Sent to the host when a viewer joins its room.
    ViewerConnected {
        viewer_id: ConnectionId,
        viewer_count: usize,
    },

    /// Sent to the host when a viewer leaves its room.
    ViewerDisconnected {
        viewer_id: ConnectionId,
        viewer_count: usize,
    },

    /// Sent to every viewer when the host disconnects; the room is gone.
    HostDisconnected,

    /// Sent to the host and all viewers after a settings update.
    SettingsUpdated { quality: u8, fps: u8 },

    /// One captured frame, delivered to every viewer at the room's cadence.
    ScreenFrame {
        /// Base64-encoded image bytes, format decided by the capturer.
        frame: String,
        /// Capture time as milliseconds since the Unix epoch.
        timestamp: u64,
        quality: u8,
    },

    /// A remote-control command was rejected or failed; non-fatal.  The
    /// wire field mirrors the command's own `"type"` discriminant.
    ControlFailed {
        #[serde(rename = "type")]
        command: String,
        reason: String,
    },

    /// A request failed (room conflict, unknown room, bad id, ...).
    Error { message: String },

    /// WebRTC signaling relay: an SDP offer from `sender`.
    Offer {
        sender: ConnectionId,
        offer: serde_json::Value,
    },

    /// WebRTC signaling relay: an SDP answer from `sender`.
    Answer {
        sender: ConnectionId,
        answer: serde_json::Value,
    },

    /// WebRTC signaling relay: an ICE candidate from `sender`.
    IceCandidate {
        sender: ConnectionId,
        candidate: serde_json::Value,
    },

    /// Reply to `list-rooms`.
    RoomList { rooms: Vec<RoomSummary> },

    /// Reply to `room-stats`.
    RoomStats {
        #[serde(flatten)]
        room: RoomSummary,
    },

    /// Reply to `health`.
    Health {
        uptime_secs: u64,
        connection_count: usize,
        room_count: usize,
    },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
