pub mod camera;
pub mod camera_error;
pub mod video_surface;
