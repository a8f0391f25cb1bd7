pub mod detection_loop;
pub mod session_config;
pub mod session_error;
pub mod session_view;
pub mod viewer_session;
