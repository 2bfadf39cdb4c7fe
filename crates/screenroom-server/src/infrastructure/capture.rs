//! Screen capture backends.
//!
//! The application layer only knows the [`ScreenCapturer`] trait; this module
//! provides the built-in backend.  A real capture backend (X11 shared memory,
//! Windows DXGI duplication, ...) plugs in by implementing the same trait and
//! swapping the constructor call in `main.rs`.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::application::ScreenCapturer;

/// Deterministic synthetic capturer for development and headless servers.
///
/// Produces a small byte pattern that varies per frame (so consecutive frames
/// are distinguishable on the wire) and embeds the requested quality, without
/// touching any display API.
#[derive(Debug, Default)]
pub struct TestPatternCapturer {
    frame_counter: AtomicU64,
}

impl TestPatternCapturer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScreenCapturer for TestPatternCapturer {
    async fn capture(&self, quality: u8) -> Result<Vec<u8>, String> {
        let frame = self.frame_counter.fetch_add(1, Ordering::Relaxed);

        // 64 bytes: an 8-byte frame counter, the quality byte, then a ramp.
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(&frame.to_be_bytes());
        bytes.push(quality);
        for i in 0..55u8 {
            bytes.push(i.wrapping_mul(quality));
        }
        Ok(bytes)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
