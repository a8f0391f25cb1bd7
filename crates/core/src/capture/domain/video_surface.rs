use std::sync::{Arc, Mutex};

use crate::shared::frame::Frame;

/// Shared slot holding the most recent camera frame.
///
/// The capture thread presents frames; the detection loop and the
/// front-end read the latest one. Cloning shares the same slot.
#[derive(Clone, Default)]
pub struct VideoSurface {
    slot: Arc<Mutex<Option<Frame>>>,
}

impl VideoSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn present(&self, frame: Frame) {
        *self.lock() = Some(frame);
    }

    pub fn latest(&self) -> Option<Frame> {
        self.lock().clone()
    }

    /// Detaches the current source; `latest` returns `None` until the next frame.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Frame>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}
