pub mod canvas;
pub mod overlay_renderer;
