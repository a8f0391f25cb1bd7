use crate::detection::domain::face_analysis::{BoundingBox, Point};
use crate::shared::display_size::DisplaySize;

/// An 8-bit RGBA color with non-premultiplied alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const YELLOW: Self = Self([255, 255, 0, 255]);
    pub const MAGENTA: Self = Self([255, 0, 255, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);

    pub const fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }
}

/// Transparent drawing surface laid over the video.
///
/// Coordinates are display pixels with a top-left origin. Text `y` is the
/// baseline, as with an HTML canvas.
pub trait Canvas: Send {
    /// Matches the canvas to the video's display size and clears it.
    fn resize(&mut self, size: DisplaySize);

    fn clear(&mut self);

    /// Stroked rectangle with an optional caption inside its top-left corner.
    fn draw_box(&mut self, bbox: &BoundingBox, color: Color, caption: Option<&str>);

    fn draw_landmarks(&mut self, points: &[Point], color: Color);

    fn draw_text(&mut self, text: &str, x: f64, y: f64, color: Color);

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color);

    /// Publishes the finished drawing.
    fn present(&mut self);

    /// Detaches the canvas from the view. A later `resize` reattaches it.
    fn remove(&mut self);
}
