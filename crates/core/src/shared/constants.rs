use std::time::Duration;

/// Fixed detection loop period, independent of the camera frame rate.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Delay between revealing the video and the first tick, so the overlay is
/// not sized from unsettled video metrics.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on waiting for the camera to report its natural size.
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of instantaneous frame-rate samples kept for the smoothed FPS.
pub const FPS_WINDOW_CAPACITY: usize = 30;

pub const PREFERRED_WIDTH: u32 = 720;
pub const PREFERRED_HEIGHT: u32 = 560;

/// Tiny face detector defaults (fast variant).
pub const DEFAULT_DETECTOR_INPUT_SIZE: u32 = 416;
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.5;

pub const MODEL_EXTENSION: &str = "onnx";
pub const APP_DIR_NAME: &str = "FaceCam";
