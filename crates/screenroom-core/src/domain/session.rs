//! Session domain types: client roles, room settings, and their invariants.
//!
//! The clamping rules live here, next to the types, so that every code path
//! that produces a [`RoomSettings`] goes through the same normalization.
//! Out-of-range values are clamped rather than rejected — a host asking for
//! `quality: 500` gets `100`, not an error — while a missing or empty room id
//! is rejected outright (there is no sensible value to substitute).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Opaque identifier for one live connection, assigned at accept time.
pub type ConnectionId = Uuid;

/// Inclusive bounds for the JPEG-style capture quality parameter.
pub const QUALITY_MIN: u8 = 10;
pub const QUALITY_MAX: u8 = 100;

/// Inclusive bounds for the broadcast cadence in frames per second.
pub const FPS_MIN: u8 = 1;
pub const FPS_MAX: u8 = 30;

/// Role of a connection within the session.
///
/// Every connection starts `Unassigned` and becomes `Host` or `Viewer` on its
/// first successful join.  Exactly one host exists per room; the host role is
/// never reassigned for the lifetime of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientRole {
    Unassigned,
    Host,
    Viewer,
}

/// Pixel dimensions of the host display, as reported by the input-injection
/// collaborator at startup.  Remote-control coordinates are validated against
/// these bounds (inclusive on both ends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// Effective per-room broadcast settings.
///
/// Both fields are always within their clamping ranges; the only way to build
/// a `RoomSettings` from untrusted input is through [`RoomSettings::clamped`]
/// or [`RoomSettings::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    /// Capture quality in `[10, 100]`.
    pub quality: u8,
    /// Broadcast cadence in `[1, 30]` frames per second.
    pub fps: u8,
}

impl Default for RoomSettings {
    /// Quality 60 at 10 FPS — the cadence the first version of this server
    /// hardcoded, kept as the default when a host joins without settings.
    fn default() -> Self {
        Self {
            quality: 60,
            fps: 10,
        }
    }
}

impl RoomSettings {
    /// Builds settings from raw (possibly out-of-range) integers by clamping.
    pub fn clamped(quality: i64, fps: i64) -> Self {
        Self {
            quality: clamp_quality(quality),
            fps: clamp_fps(fps),
        }
    }

    /// Merges a partial update into these settings, clamping supplied fields.
    ///
    /// Omitted fields retain their prior values (last-writer-wins per field).
    pub fn apply(&self, patch: &SettingsPatch) -> Self {
        Self {
            quality: patch.quality.map(clamp_quality).unwrap_or(self.quality),
            fps: patch.fps.map(clamp_fps).unwrap_or(self.fps),
        }
    }

    /// The broadcast tick period derived from `fps`.
    ///
    /// `fps` is at least 1 after clamping, so the division is safe.
    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.fps))
    }
}

/// A partial settings update as received from the wire.
///
/// Fields are wide integers so that out-of-range input (`quality: 500`,
/// `fps: -3`) deserializes successfully and is then clamped, rather than
/// failing JSON decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<i64>,
}

impl SettingsPatch {
    /// Returns `true` when the patch carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.quality.is_none() && self.fps.is_none()
    }
}

fn clamp_quality(quality: i64) -> u8 {
    quality.clamp(i64::from(QUALITY_MIN), i64::from(QUALITY_MAX)) as u8
}

fn clamp_fps(fps: i64) -> u8 {
    fps.clamp(i64::from(FPS_MIN), i64::from(FPS_MAX)) as u8
}

/// Error type for room identifier validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomIdError {
    #[error("room id must not be empty")]
    Empty,
}

/// Validates a caller-supplied room identifier.
///
/// Rooms are keyed by an opaque caller-chosen string; the only structural
/// requirement is that it is non-empty (after trimming whitespace).
///
/// # Errors
///
/// Returns [`RoomIdError::Empty`] for an empty or whitespace-only id.
pub fn validate_room_id(room_id: &str) -> Result<(), RoomIdError> {
    if room_id.trim().is_empty() {
        return Err(RoomIdError::Empty);
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
