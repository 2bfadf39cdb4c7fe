//! RoomRegistry: the set of active sharing sessions.
//!
//! A room exists if and only if its host connection is alive.  The host is
//! fixed at creation and never reassigned; when the host leaves, the whole
//! room is torn down and every viewer is implicitly detached.  Viewers come
//! and go without affecting the room's lifetime.
//!
//! All mutating operations are atomic with respect to the registry: callers
//! serialize access through the orchestrator's session lock, and no operation
//! leaves a partially constructed room visible.

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use screenroom_core::{
    validate_room_id, ConnectionId, RoomSettings, RoomSummary, SettingsPatch,
};

/// Error type for registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("room id must not be empty")]
    EmptyRoomId,
    #[error("room '{0}' already exists")]
    RoomAlreadyExists(String),
    #[error("room '{0}' not found")]
    RoomNotFound(String),
    #[error("connection is not the host of room '{0}'")]
    NotHost(String),
}

/// One active sharing session.
#[derive(Debug, Clone)]
pub struct Room {
    pub room_id: String,
    /// The host connection.  Immutable for the room's lifetime.
    pub host: ConnectionId,
    /// Viewer membership; insertion order is irrelevant, rejoin is idempotent.
    pub viewers: HashSet<ConnectionId>,
    pub settings: RoomSettings,
    pub created_at: SystemTime,
}

/// Projection of one room for the read-only query surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStats {
    pub room_id: String,
    pub viewer_count: usize,
    pub settings: RoomSettings,
    pub created_at_ms: u64,
}

impl From<RoomStats> for RoomSummary {
    fn from(stats: RoomStats) -> Self {
        RoomSummary {
            room_id: stats.room_id,
            viewer_count: stats.viewer_count,
            settings: stats.settings,
            created_at_ms: stats.created_at_ms,
        }
    }
}

/// Outcome of a connection leaving a room.
#[derive(Debug)]
pub enum Departure {
    /// The host left: the room was destroyed.  The snapshot carries the final
    /// viewer set so the caller can notify every evicted viewer.
    HostLeft(Room),
    /// A viewer left: the room persists with the returned viewer count.
    ViewerLeft { viewer_count: usize },
    /// The connection was not a member of that room.
    NotAMember,
}

/// In-memory registry of active rooms, keyed by caller-supplied room id.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room with `host` as its host, clamping any requested
    /// settings, and returns the effective settings.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::EmptyRoomId`] for an empty/whitespace id.
    /// - [`RegistryError::RoomAlreadyExists`] if the id is already in use; the
    ///   existing room is left untouched.
    pub fn create_room(
        &mut self,
        room_id: &str,
        host: ConnectionId,
        requested: Option<&SettingsPatch>,
    ) -> Result<RoomSettings, RegistryError> {
        validate_room_id(room_id).map_err(|_| RegistryError::EmptyRoomId)?;
        if self.rooms.contains_key(room_id) {
            return Err(RegistryError::RoomAlreadyExists(room_id.to_string()));
        }

        let settings = match requested {
            Some(patch) => RoomSettings::default().apply(patch),
            None => RoomSettings::default(),
        };
        self.rooms.insert(
            room_id.to_string(),
            Room {
                room_id: room_id.to_string(),
                host,
                viewers: HashSet::new(),
                settings,
                created_at: SystemTime::now(),
            },
        );
        Ok(settings)
    }

    /// Adds a viewer to an existing room; rejoin is idempotent.
    ///
    /// Returns the room's current settings and the viewer count after the
    /// join.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RoomNotFound`] if the room does not exist.
    pub fn join_as_viewer(
        &mut self,
        room_id: &str,
        connection: ConnectionId,
    ) -> Result<(RoomSettings, usize), RegistryError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RegistryError::RoomNotFound(room_id.to_string()))?;
        room.viewers.insert(connection);
        Ok((room.settings, room.viewers.len()))
    }

    /// Removes a connection from a room.
    ///
    /// If the connection is the host, the room is destroyed and its final
    /// snapshot returned; the caller owns the cascading viewer notifications.
    /// If it is a viewer, only that entry leaves the viewer set.
    pub fn leave_room(&mut self, connection: ConnectionId, room_id: &str) -> Departure {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return Departure::NotAMember;
        };

        if room.host == connection {
            // Cascading departure: destroy the room, detach every viewer.
            let snapshot = self.rooms.remove(room_id).expect("room present");
            return Departure::HostLeft(snapshot);
        }

        if room.viewers.remove(&connection) {
            Departure::ViewerLeft {
                viewer_count: room.viewers.len(),
            }
        } else {
            Departure::NotAMember
        }
    }

    /// Applies a partial settings update; host only, last-writer-wins.
    ///
    /// Returns the new effective settings.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::RoomNotFound`] if the room does not exist.
    /// - [`RegistryError::NotHost`] if the requester is not the room's host;
    ///   settings are left unchanged.
    pub fn update_settings(
        &mut self,
        room_id: &str,
        requester: ConnectionId,
        patch: &SettingsPatch,
    ) -> Result<RoomSettings, RegistryError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RegistryError::RoomNotFound(room_id.to_string()))?;
        if room.host != requester {
            return Err(RegistryError::NotHost(room_id.to_string()));
        }
        room.settings = room.settings.apply(patch);
        Ok(room.settings)
    }

    /// Stats projection for one room, or `None` if absent.
    pub fn stats(&self, room_id: &str) -> Option<RoomStats> {
        self.rooms.get(room_id).map(room_stats)
    }

    /// Stats projection over all active rooms.
    pub fn list(&self) -> Vec<RoomStats> {
        self.rooms.values().map(room_stats).collect()
    }

    /// The host connection of a room, if the room exists.
    pub fn host_of(&self, room_id: &str) -> Option<ConnectionId> {
        self.rooms.get(room_id).map(|room| room.host)
    }

    /// Membership snapshot for one broadcast tick, or `None` if the room is
    /// gone.  The host is deliberately excluded: it never receives its own
    /// frame.
    pub fn viewer_ids(&self, room_id: &str) -> Option<Vec<ConnectionId>> {
        self.rooms
            .get(room_id)
            .map(|room| room.viewers.iter().copied().collect())
    }

    /// Number of active rooms, for the health snapshot.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

fn room_stats(room: &Room) -> RoomStats {
    RoomStats {
        room_id: room.room_id.clone(),
        viewer_count: room.viewers.len(),
        settings: room.settings,
        created_at_ms: room
            .created_at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn patch(quality: i64, fps: i64) -> SettingsPatch {
        SettingsPatch {
            quality: Some(quality),
            fps: Some(fps),
        }
    }

    // ── Creation ──────────────────────────────────────────────────────────────

    #[test]
    fn test_create_room_returns_clamped_settings() {
        let mut registry = RoomRegistry::new();

        let settings = registry
            .create_room("demo", Uuid::new_v4(), Some(&patch(500, 0)))
            .expect("creation must succeed");

        assert_eq!(settings.quality, 100);
        assert_eq!(settings.fps, 1);
    }

    #[test]
    fn test_create_room_without_settings_uses_defaults() {
        let mut registry = RoomRegistry::new();

        let settings = registry.create_room("demo", Uuid::new_v4(), None).unwrap();

        assert_eq!(settings, RoomSettings::default());
    }

    #[test]
    fn test_create_room_rejects_duplicate_id() {
        let mut registry = RoomRegistry::new();
        registry.create_room("demo", Uuid::new_v4(), None).unwrap();

        let result = registry.create_room("demo", Uuid::new_v4(), None);

        assert_eq!(
            result,
            Err(RegistryError::RoomAlreadyExists("demo".to_string()))
        );
    }

    #[test]
    fn test_create_room_rejects_empty_id() {
        let mut registry = RoomRegistry::new();
        let result = registry.create_room("  ", Uuid::new_v4(), None);
        assert_eq!(result, Err(RegistryError::EmptyRoomId));
    }

    #[test]
    fn test_room_id_can_be_reused_after_teardown() {
        let mut registry = RoomRegistry::new();
        let host = Uuid::new_v4();
        registry.create_room("demo", host, None).unwrap();
        registry.leave_room(host, "demo");

        // The key was freed on teardown; a new host may claim it.
        assert!(registry.create_room("demo", Uuid::new_v4(), None).is_ok());
    }

    // ── Viewer membership ─────────────────────────────────────────────────────

    #[test]
    fn test_join_as_viewer_increments_count() {
        let mut registry = RoomRegistry::new();
        registry.create_room("demo", Uuid::new_v4(), None).unwrap();

        let (_, count) = registry.join_as_viewer("demo", Uuid::new_v4()).unwrap();

        assert_eq!(count, 1);
    }

    #[test]
    fn test_join_as_viewer_unknown_room_fails() {
        let mut registry = RoomRegistry::new();
        let result = registry.join_as_viewer("nope", Uuid::new_v4());
        assert_eq!(result, Err(RegistryError::RoomNotFound("nope".to_string())));
    }

    #[test]
    fn test_join_as_viewer_rejoin_is_idempotent() {
        let mut registry = RoomRegistry::new();
        registry.create_room("demo", Uuid::new_v4(), None).unwrap();
        let viewer = Uuid::new_v4();

        registry.join_as_viewer("demo", viewer).unwrap();
        let (_, count) = registry.join_as_viewer("demo", viewer).unwrap();

        assert_eq!(count, 1, "set semantics: rejoin must not double-count");
    }

    // ── Departure ─────────────────────────────────────────────────────────────

    #[test]
    fn test_host_departure_destroys_room_and_returns_snapshot() {
        let mut registry = RoomRegistry::new();
        let host = Uuid::new_v4();
        let v1 = Uuid::new_v4();
        let v2 = Uuid::new_v4();
        registry.create_room("demo", host, None).unwrap();
        registry.join_as_viewer("demo", v1).unwrap();
        registry.join_as_viewer("demo", v2).unwrap();

        let departure = registry.leave_room(host, "demo");

        match departure {
            Departure::HostLeft(room) => {
                assert!(room.viewers.contains(&v1));
                assert!(room.viewers.contains(&v2));
            }
            other => panic!("expected HostLeft, got {other:?}"),
        }
        assert!(registry.stats("demo").is_none(), "room must be gone");
    }

    #[test]
    fn test_viewer_departure_keeps_room_alive() {
        let mut registry = RoomRegistry::new();
        let host = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        registry.create_room("demo", host, None).unwrap();
        registry.join_as_viewer("demo", viewer).unwrap();

        let departure = registry.leave_room(viewer, "demo");

        assert!(matches!(departure, Departure::ViewerLeft { viewer_count: 0 }));
        assert!(registry.stats("demo").is_some(), "room must persist");
    }

    #[test]
    fn test_leave_room_by_stranger_is_not_a_member() {
        let mut registry = RoomRegistry::new();
        registry.create_room("demo", Uuid::new_v4(), None).unwrap();

        let departure = registry.leave_room(Uuid::new_v4(), "demo");

        assert!(matches!(departure, Departure::NotAMember));
    }

    // ── Settings updates ──────────────────────────────────────────────────────

    #[test]
    fn test_update_settings_merges_partial_patch() {
        let mut registry = RoomRegistry::new();
        let host = Uuid::new_v4();
        registry
            .create_room("demo", host, Some(&patch(80, 15)))
            .unwrap();

        let updated = registry
            .update_settings(
                "demo",
                host,
                &SettingsPatch {
                    quality: None,
                    fps: Some(24),
                },
            )
            .unwrap();

        assert_eq!(updated.quality, 80, "omitted field keeps prior value");
        assert_eq!(updated.fps, 24);
    }

    #[test]
    fn test_update_settings_by_non_host_is_unauthorized_and_unchanged() {
        let mut registry = RoomRegistry::new();
        let host = Uuid::new_v4();
        registry
            .create_room("demo", host, Some(&patch(80, 15)))
            .unwrap();

        let result = registry.update_settings("demo", Uuid::new_v4(), &patch(10, 1));

        assert_eq!(result, Err(RegistryError::NotHost("demo".to_string())));
        let stats = registry.stats("demo").unwrap();
        assert_eq!(stats.settings.quality, 80, "settings must be unchanged");
        assert_eq!(stats.settings.fps, 15);
    }

    #[test]
    fn test_update_settings_unknown_room_fails() {
        let mut registry = RoomRegistry::new();
        let result = registry.update_settings("nope", Uuid::new_v4(), &patch(50, 10));
        assert_eq!(result, Err(RegistryError::RoomNotFound("nope".to_string())));
    }

    // ── Projections ───────────────────────────────────────────────────────────

    #[test]
    fn test_viewer_ids_excludes_host() {
        let mut registry = RoomRegistry::new();
        let host = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        registry.create_room("demo", host, None).unwrap();
        registry.join_as_viewer("demo", viewer).unwrap();

        let ids = registry.viewer_ids("demo").unwrap();

        assert_eq!(ids, vec![viewer]);
        assert!(!ids.contains(&host), "host never receives its own frame");
    }

    #[test]
    fn test_viewer_ids_for_missing_room_is_none() {
        let registry = RoomRegistry::new();
        assert!(registry.viewer_ids("gone").is_none());
    }

    #[test]
    fn test_list_reports_all_rooms() {
        let mut registry = RoomRegistry::new();
        registry.create_room("a", Uuid::new_v4(), None).unwrap();
        registry.create_room("b", Uuid::new_v4(), None).unwrap();

        let mut ids: Vec<String> = registry.list().into_iter().map(|s| s.room_id).collect();
        ids.sort();

        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.room_count(), 2);
    }
}
