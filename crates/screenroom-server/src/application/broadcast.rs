//! BroadcastScheduler: one periodic capture-and-publish task per room.
//!
//! For every active room the scheduler runs a Tokio task that, at the room's
//! configured cadence (`1000/fps` ms), invokes the capture collaborator and
//! publishes the encoded frame to every viewer.  The host never receives its
//! own frame.
//!
//! # Cadence discipline
//!
//! The cadence is capped by capture + encode latency: the tick body awaits
//! the capture inline, so captures for one room are single-flight by
//! construction, and a tick that fires late is skipped rather than queued
//! (`MissedTickBehavior::Skip`).  A capture failure is logged and swallowed —
//! transient failures (display momentarily locked, for instance) are
//! expected, and the stream self-heals on the next tick.
//!
//! # Cancellation
//!
//! `stop` flips a per-task cancellation flag before aborting the task.  The
//! tick re-checks that flag after the capture completes and before
//! publishing, so no frame is published after `stop` returns.  The viewer
//! set is re-read under the session lock at the same point: the capture's
//! completion re-enters the serialization point before touching broadcast
//! state, and a tick that finds its room gone exits the task on its own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use screenroom_core::{RoomSettings, ServerMessage};

use crate::application::orchestrator::{OutboundSink, SharedSessions};

/// Trait for the external pixel-capture collaborator.
///
/// Given a quality parameter, produces one encoded image of the host screen.
/// Infrastructure implementations talk to the display; test implementations
/// return canned bytes or scripted failures.
#[async_trait]
pub trait ScreenCapturer: Send + Sync {
    async fn capture(&self, quality: u8) -> Result<Vec<u8>, String>;
}

/// Error type for scheduler operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// A broadcast task already exists for this room; callers must `stop`
    /// first (or use `restart`).
    #[error("broadcast task already running for room '{0}'")]
    AlreadyRunning(String),
}

/// Handle to one room's recurring broadcast task.
struct BroadcastTask {
    handle: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
}

/// Owns the per-room broadcast tasks, keyed by room id.
pub struct BroadcastScheduler {
    capturer: Arc<dyn ScreenCapturer>,
    sink: Arc<dyn OutboundSink>,
    sessions: SharedSessions,
    tasks: Mutex<HashMap<String, BroadcastTask>>,
}

impl BroadcastScheduler {
    pub fn new(
        capturer: Arc<dyn ScreenCapturer>,
        sink: Arc<dyn OutboundSink>,
        sessions: SharedSessions,
    ) -> Self {
        Self {
            capturer,
            sink,
            sessions,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Begins the recurring capture-and-publish task for a room.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if a task for this room
    /// already exists.
    pub fn start(&self, room_id: &str, settings: RoomSettings) -> Result<(), SchedulerError> {
        let mut tasks = self.tasks.lock().expect("lock poisoned");
        if tasks.contains_key(room_id) {
            return Err(SchedulerError::AlreadyRunning(room_id.to_string()));
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(run_room_broadcast(
            room_id.to_string(),
            settings,
            Arc::clone(&self.capturer),
            Arc::clone(&self.sink),
            Arc::clone(&self.sessions),
            Arc::clone(&cancelled),
        ));
        tasks.insert(room_id.to_string(), BroadcastTask { handle, cancelled });

        debug!(room = %room_id, fps = settings.fps, quality = settings.quality,
               "broadcast task started");
        Ok(())
    }

    /// Cancels and removes a room's broadcast task.
    ///
    /// No-op if none exists — teardown paths call this defensively.  When
    /// this returns, no further frame will be published for the room.
    pub fn stop(&self, room_id: &str) {
        let task = self.tasks.lock().expect("lock poisoned").remove(room_id);
        if let Some(task) = task {
            // Flag first, then abort: a tick past its cancellation check
            // cannot cross the next await point once aborted.
            task.cancelled.store(true, Ordering::Relaxed);
            task.handle.abort();
            debug!(room = %room_id, "broadcast task stopped");
        }
    }

    /// Stops and restarts a room's task so new settings take effect on the
    /// very next tick rather than drifting in on the old cadence.
    pub fn restart(&self, room_id: &str, settings: RoomSettings) -> Result<(), SchedulerError> {
        self.stop(room_id);
        self.start(room_id, settings)
    }

    /// Whether a task is registered for this room.
    pub fn is_running(&self, room_id: &str) -> bool {
        self.tasks.lock().expect("lock poisoned").contains_key(room_id)
    }
}

/// Body of one room's broadcast task.
async fn run_room_broadcast(
    room_id: String,
    settings: RoomSettings,
    capturer: Arc<dyn ScreenCapturer>,
    sink: Arc<dyn OutboundSink>,
    sessions: SharedSessions,
    cancelled: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(settings.frame_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick resolves immediately; skip it so the cadence starts one
    // period after the room is created.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if cancelled.load(Ordering::Relaxed) {
            break;
        }

        let frame = match capturer.capture(settings.quality).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(room = %room_id, error = %e, "capture failed; retrying on next tick");
                continue;
            }
        };

        // Re-enter the serialization point: membership may have changed while
        // the capture was in flight, and the room may be gone entirely.
        let viewers = {
            let state = sessions.lock().await;
            match state.rooms.viewer_ids(&room_id) {
                Some(viewers) => viewers,
                None => {
                    debug!(room = %room_id, "room gone; broadcast task exiting");
                    break;
                }
            }
        };
        if cancelled.load(Ordering::Relaxed) {
            break;
        }

        let message = ServerMessage::ScreenFrame {
            frame: BASE64.encode(&frame),
            timestamp: now_millis(),
            quality: settings.quality,
        };
        for viewer in viewers {
            sink.send(viewer, message.clone()).await;
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ── Tests ─────────────────────────────────────────────────────────────────────
