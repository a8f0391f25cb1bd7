use std::time::Duration;

use serde::Deserialize;

use crate::capture::domain::camera_error::CameraError;
use crate::capture::domain::video_surface::VideoSurface;
use crate::shared::constants::{PREFERRED_HEIGHT, PREFERRED_WIDTH};
use crate::shared::display_size::DisplaySize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front-facing camera.
    #[default]
    User,
    Environment,
}

/// What the session asks of the camera. Width and height are preferences;
/// the device may deliver a different resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureConstraints {
    pub width: u32,
    pub height: u32,
    pub facing: FacingMode,
    pub audio: bool,
    /// Backend-specific device name. `None` selects the platform default.
    pub device: Option<String>,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            width: PREFERRED_WIDTH,
            height: PREFERRED_HEIGHT,
            facing: FacingMode::User,
            audio: false,
            device: None,
        }
    }
}

/// Acquires camera streams.
pub trait CameraSource: Send {
    /// Requests a stream bound to `surface`. Fails with a classified
    /// [`CameraError`] when the device cannot be acquired.
    fn open(
        &mut self,
        constraints: &CaptureConstraints,
        surface: VideoSurface,
    ) -> Result<Box<dyn CameraStream>, CameraError>;
}

/// A live camera stream. Dropping it must release the device.
pub trait CameraStream: Send {
    /// Blocks until the natural video dimensions are known.
    fn wait_for_metadata(&mut self, timeout: Duration) -> Result<DisplaySize, CameraError>;

    /// Starts delivering frames to the bound surface.
    fn play(&mut self) -> Result<(), CameraError>;

    /// Stops all tracks and detaches the surface. Idempotent.
    fn stop(&mut self);

    fn is_live(&self) -> bool;
}
