use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    pixelcolor::raw::RawU32,
    prelude::*,
    primitives::{Circle, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, StrokeAlignment},
    text::{Baseline, Text},
};
use image::{Rgba, RgbaImage};

use crate::detection::domain::face_analysis::{BoundingBox, Point as FacePoint};
use crate::overlay::domain::canvas::{Canvas, Color};
use crate::shared::display_size::DisplaySize;
use crate::shared::frame::Frame;

const BOX_STROKE_WIDTH: u32 = 2;
const LANDMARK_DIAMETER: u32 = 3;
const CAPTION_PADDING: i32 = 2;

impl PixelColor for Color {
    type Raw = RawU32;
}

/// Latest presented overlay, shared between the detection loop and the
/// front-end. Cloning shares the same slot.
#[derive(Clone, Default)]
pub struct SharedOverlay {
    slot: Arc<Mutex<Option<RgbaImage>>>,
}

impl SharedOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<RgbaImage> {
        self.lock().clone()
    }

    fn publish(&self, image: RgbaImage) {
        *self.lock() = Some(image);
    }

    fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<RgbaImage>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Transparent RGBA canvas drawn with `embedded-graphics`.
pub struct ImageCanvas {
    image: RgbaImage,
    output: SharedOverlay,
}

impl ImageCanvas {
    pub fn new(output: SharedOverlay) -> Self {
        Self {
            image: RgbaImage::new(0, 0),
            output,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    fn draw<D>(&mut self, drawable: &D)
    where
        D: Drawable<Color = Color>,
    {
        match drawable.draw(&mut Target(&mut self.image)) {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

impl Canvas for ImageCanvas {
    fn resize(&mut self, size: DisplaySize) {
        self.image = RgbaImage::new(size.width, size.height);
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba(Color::TRANSPARENT.0);
        }
    }

    fn draw_box(&mut self, bbox: &BoundingBox, color: Color, caption: Option<&str>) {
        let rect = Rectangle::new(
            to_point(bbox.x, bbox.y),
            Size::new(bbox.width.round().max(0.0) as u32, bbox.height.round().max(0.0) as u32),
        );
        let stroke = PrimitiveStyleBuilder::new()
            .stroke_color(color)
            .stroke_width(BOX_STROKE_WIDTH)
            .stroke_alignment(StrokeAlignment::Inside)
            .build();
        self.draw(&rect.into_styled(stroke));

        if let Some(caption) = caption {
            let style = MonoTextStyle::new(&FONT_10X20, Color::WHITE);
            let origin = to_point(bbox.x, bbox.y) + Point::new(CAPTION_PADDING, CAPTION_PADDING);
            let text = Text::with_baseline(caption, origin, style, Baseline::Top);
            let background = text.bounding_box();
            self.draw(&background.into_styled(PrimitiveStyle::with_fill(color)));
            self.draw(&text);
        }
    }

    fn draw_landmarks(&mut self, points: &[FacePoint], color: Color) {
        for p in points {
            let dot = Circle::with_center(to_point(p.x, p.y), LANDMARK_DIAMETER)
                .into_styled(PrimitiveStyle::with_fill(color));
            self.draw(&dot);
        }
    }

    fn draw_text(&mut self, text: &str, x: f64, y: f64, color: Color) {
        let style = MonoTextStyle::new(&FONT_10X20, color);
        self.draw(&Text::with_baseline(text, to_point(x, y), style, Baseline::Alphabetic));
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color) {
        let rect = Rectangle::new(
            to_point(x, y),
            Size::new(width.round().max(0.0) as u32, height.round().max(0.0) as u32),
        );
        self.draw(&rect.into_styled(PrimitiveStyle::with_fill(color)));
    }

    fn present(&mut self) {
        self.output.publish(self.image.clone());
    }

    fn remove(&mut self) {
        self.image = RgbaImage::new(0, 0);
        self.output.clear();
    }
}

/// Lays `overlay` over `frame`, stretching it to the frame size when the
/// display size differs from the natural video size.
pub fn composite(frame: &Frame, overlay: Option<&RgbaImage>) -> RgbaImage {
    let mut base = RgbaImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.pixel_clamped(x as i64, y as i64);
        Rgba([r, g, b, 255])
    });

    if let Some(overlay) = overlay.filter(|o| o.width() > 0 && o.height() > 0) {
        if overlay.dimensions() == base.dimensions() {
            image::imageops::overlay(&mut base, overlay, 0, 0);
        } else {
            let scaled = image::imageops::resize(
                overlay,
                base.width(),
                base.height(),
                image::imageops::FilterType::Nearest,
            );
            image::imageops::overlay(&mut base, &scaled, 0, 0);
        }
    }
    base
}

fn to_point(x: f64, y: f64) -> Point {
    Point::new(x.round() as i32, y.round() as i32)
}

/// Blends pixels into the image with source-over compositing, clipping
/// anything outside its bounds.
struct Target<'a>(&'a mut RgbaImage);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle::new(
            Point::zero(),
            Size::new(self.0.width(), self.0.height()),
        )
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = self.0.dimensions();
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 || point.x as u32 >= width || point.y as u32 >= height {
                continue;
            }
            let dst = self.0.get_pixel_mut(point.x as u32, point.y as u32);
            *dst = Rgba(blend(dst.0, color.0));
        }
        Ok(())
    }
}

/// Source-over blend of non-premultiplied RGBA.
fn blend(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    let sa = src[3] as f32 / 255.0;
    if sa >= 1.0 {
        return src;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round() as u8;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(width: u32, height: u32) -> (ImageCanvas, SharedOverlay) {
        let shared = SharedOverlay::new();
        let mut canvas = ImageCanvas::new(shared.clone());
        canvas.resize(DisplaySize::new(width, height));
        (canvas, shared)
    }

    fn opaque_count(image: &RgbaImage) -> usize {
        image.pixels().filter(|p| p.0[3] > 0).count()
    }

    #[test]
    fn test_resize_starts_transparent() {
        let (canvas, _) = canvas(40, 30);
        assert_eq!(canvas.image().dimensions(), (40, 30));
        assert_eq!(opaque_count(canvas.image()), 0);
    }

    #[test]
    fn test_draw_box_strokes_outline_only() {
        let (mut canvas, _) = canvas(100, 100);
        canvas.draw_box(&BoundingBox::new(10.0, 10.0, 50.0, 50.0), Color::BLUE, None);
        let img = canvas.image();
        assert_eq!(img.get_pixel(10, 30).0, Color::BLUE.0);
        assert_eq!(img.get_pixel(35, 35).0[3], 0);
    }

    #[test]
    fn test_drawing_outside_bounds_is_clipped() {
        let (mut canvas, _) = canvas(20, 20);
        canvas.draw_box(&BoundingBox::new(-50.0, -50.0, 500.0, 500.0), Color::GREEN, Some("0.99"));
        canvas.draw_text("far away", 1000.0, 1000.0, Color::WHITE);
        canvas.draw_landmarks(&[FacePoint::new(-5.0, 300.0)], Color::MAGENTA);
        assert_eq!(canvas.image().dimensions(), (20, 20));
    }

    #[test]
    fn test_draw_text_marks_pixels() {
        let (mut canvas, _) = canvas(200, 40);
        canvas.draw_text("Happy (90%)", 0.0, 30.0, Color::YELLOW);
        assert!(opaque_count(canvas.image()) > 0);
    }

    #[test]
    fn test_clear_resets_to_transparent() {
        let (mut canvas, _) = canvas(30, 30);
        canvas.fill_rect(0.0, 0.0, 30.0, 30.0, Color::GREEN);
        assert_eq!(opaque_count(canvas.image()), 900);
        canvas.clear();
        assert_eq!(opaque_count(canvas.image()), 0);
    }

    #[test]
    fn test_present_publishes_and_remove_clears() {
        let (mut canvas, shared) = canvas(10, 10);
        assert!(shared.latest().is_none());
        canvas.fill_rect(0.0, 0.0, 5.0, 5.0, Color::GREEN);
        canvas.present();
        let published = shared.latest().unwrap();
        assert_eq!(published.get_pixel(2, 2).0, Color::GREEN.0);
        canvas.remove();
        assert!(shared.latest().is_none());
        assert_eq!(canvas.image().dimensions(), (0, 0));
    }

    #[test]
    fn test_blend_half_alpha_over_opaque() {
        let out = blend([0, 0, 0, 255], [255, 255, 255, 128]);
        assert_eq!(out[3], 255);
        assert!((126..=130).contains(&out[0]));
    }

    #[test]
    fn test_composite_overlays_frame() {
        let frame = Frame::new(vec![10u8; 4 * 4 * 3], 4, 4, 0);
        let mut overlay = RgbaImage::new(4, 4);
        overlay.put_pixel(1, 1, Rgba([0, 255, 0, 255]));
        let out = composite(&frame, Some(&overlay));
        assert_eq!(out.get_pixel(1, 1).0, [0, 255, 0, 255]);
        assert_eq!(out.get_pixel(0, 0).0, [10, 10, 10, 255]);
    }

    #[test]
    fn test_composite_scales_mismatched_overlay() {
        let frame = Frame::new(vec![0u8; 8 * 8 * 3], 8, 8, 0);
        let overlay = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        let out = composite(&frame, Some(&overlay));
        assert_eq!(out.get_pixel(7, 7).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_composite_without_overlay() {
        let frame = Frame::new(vec![7u8; 2 * 2 * 3], 2, 2, 0);
        let out = composite(&frame, None);
        assert_eq!(out.get_pixel(1, 1).0, [7, 7, 7, 255]);
    }
}
