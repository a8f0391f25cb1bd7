use crate::detection::domain::face_analysis::FaceAnalysis;
use crate::detection::domain::labels::{localize_expression, localize_gender};
use crate::overlay::domain::canvas::{Canvas, Color};
use crate::shared::display_size::DisplaySize;

/// Gap between the box top and the first text line.
const TEXT_OFFSET: f64 = 10.0;
/// Vertical distance between the two text lines.
const LINE_HEIGHT: f64 = 20.0;
/// Text closer than this to the top edge moves to fixed rows.
const MIN_TEXT_Y: f64 = 20.0;

/// Expressions below this probability get no bar.
const MIN_EXPRESSION_PROBABILITY: f64 = 0.1;
const BAR_HEIGHT: f64 = 16.0;
const BAR_SPACING: f64 = 20.0;
const BAR_MIN_WIDTH: f64 = 80.0;

const BOX_COLOR: Color = Color::BLUE;
const LANDMARK_COLOR: Color = Color::MAGENTA;
const BAR_COLOR: Color = Color::from_rgba8(0, 0, 0, 128);
const BAR_TEXT_COLOR: Color = Color::WHITE;
const DEMOGRAPHICS_COLOR: Color = Color::GREEN;
const EXPRESSION_COLOR: Color = Color::YELLOW;

/// Draws one tick's result set onto the overlay canvas.
pub struct OverlayRenderer {
    canvas: Box<dyn Canvas>,
}

impl OverlayRenderer {
    pub fn new(canvas: Box<dyn Canvas>) -> Self {
        Self { canvas }
    }

    /// Sizes the canvas to the video before the first tick.
    pub fn match_dimensions(&mut self, size: DisplaySize) {
        self.canvas.resize(size);
    }

    /// Replaces the previous drawing with `faces`, which must already be
    /// in display coordinates.
    pub fn render(&mut self, faces: &[FaceAnalysis]) {
        self.canvas.clear();
        for face in faces {
            self.draw_face(face);
        }
        self.canvas.present();
    }

    pub fn remove(&mut self) {
        self.canvas.remove();
    }

    fn draw_face(&mut self, face: &FaceAnalysis) {
        let caption = format!("{:.2}", face.score);
        self.canvas.draw_box(&face.bbox, BOX_COLOR, Some(&caption));
        self.canvas.draw_landmarks(&face.landmarks, LANDMARK_COLOR);
        self.draw_expression_bars(face);

        let (first, second) = text_rows(face.bbox.y);
        let x = face.bbox.x;
        self.canvas
            .draw_text(&demographics_line(face), x, first, DEMOGRAPHICS_COLOR);
        if let Some(line) = expression_line(face) {
            self.canvas.draw_text(&line, x, second, EXPRESSION_COLOR);
        }
    }

    /// One bar per likely expression, stacked below the box.
    fn draw_expression_bars(&mut self, face: &FaceAnalysis) {
        let max_width = face.bbox.width.max(BAR_MIN_WIDTH);
        let mut y = face.bbox.bottom() + 4.0;
        for (label, p) in face.expressions.iter() {
            if p < MIN_EXPRESSION_PROBABILITY {
                continue;
            }
            self.canvas
                .fill_rect(face.bbox.x, y, max_width * p, BAR_HEIGHT, BAR_COLOR);
            self.canvas.draw_text(
                &format!("{} ({}%)", localize_expression(label), percent(p)),
                face.bbox.x + 2.0,
                y + BAR_HEIGHT - 2.0,
                BAR_TEXT_COLOR,
            );
            y += BAR_SPACING;
        }
    }
}

/// Baselines of the two text lines for a box whose top edge is `box_top`.
pub fn text_rows(box_top: f64) -> (f64, f64) {
    let y = box_top - TEXT_OFFSET;
    if y > MIN_TEXT_Y {
        (y, y + LINE_HEIGHT)
    } else {
        (MIN_TEXT_Y, MIN_TEXT_Y + LINE_HEIGHT)
    }
}

pub fn demographics_line(face: &FaceAnalysis) -> String {
    format!(
        "{} years | {} ({}%)",
        face.age.round() as i64,
        localize_gender(&face.gender),
        percent(face.gender_probability)
    )
}

pub fn expression_line(face: &FaceAnalysis) -> Option<String> {
    face.dominant_expression()
        .map(|(label, p)| format!("{} ({}%)", localize_expression(label), percent(p)))
}

fn percent(p: f64) -> i64 {
    (p * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_analysis::{BoundingBox, ExpressionScores, Point};
    use rstest::rstest;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Resize(DisplaySize),
        Clear,
        Box(Option<String>),
        Landmarks(usize),
        Text(String, f64, f64),
        Fill,
        Present,
        Remove,
    }

    #[derive(Clone, Default)]
    struct RecordingCanvas {
        ops: Arc<Mutex<Vec<Op>>>,
    }

    impl RecordingCanvas {
        fn ops(&self) -> Vec<Op> {
            self.ops.lock().unwrap().clone()
        }

        fn push(&self, op: Op) {
            self.ops.lock().unwrap().push(op);
        }
    }

    impl Canvas for RecordingCanvas {
        fn resize(&mut self, size: DisplaySize) {
            self.push(Op::Resize(size));
        }
        fn clear(&mut self) {
            self.push(Op::Clear);
        }
        fn draw_box(&mut self, _bbox: &BoundingBox, _color: Color, caption: Option<&str>) {
            self.push(Op::Box(caption.map(str::to_string)));
        }
        fn draw_landmarks(&mut self, points: &[Point], _color: Color) {
            self.push(Op::Landmarks(points.len()));
        }
        fn draw_text(&mut self, text: &str, x: f64, y: f64, _color: Color) {
            self.push(Op::Text(text.to_string(), x, y));
        }
        fn fill_rect(&mut self, _x: f64, _y: f64, _w: f64, _h: f64, _color: Color) {
            self.push(Op::Fill);
        }
        fn present(&mut self) {
            self.push(Op::Present);
        }
        fn remove(&mut self) {
            self.push(Op::Remove);
        }
    }

    fn face(y: f64) -> FaceAnalysis {
        FaceAnalysis::new(
            BoundingBox::new(50.0, y, 100.0, 120.0),
            0.876,
            vec![Point::new(60.0, y + 10.0); 68],
            ExpressionScores::new([("happy", 0.2), ("neutral", 0.7), ("sad", 0.1)]),
            31.6,
            "female",
            0.934,
        )
        .unwrap()
    }

    fn renderer() -> (OverlayRenderer, RecordingCanvas) {
        let canvas = RecordingCanvas::default();
        (OverlayRenderer::new(Box::new(canvas.clone())), canvas)
    }

    #[rstest]
    #[case(100.0, (90.0, 110.0))]
    #[case(31.0, (21.0, 41.0))]
    #[case(30.0, (20.0, 40.0))]
    #[case(5.0, (20.0, 40.0))]
    #[case(-40.0, (20.0, 40.0))]
    fn test_text_rows(#[case] top: f64, #[case] expected: (f64, f64)) {
        assert_eq!(text_rows(top), expected);
    }

    #[test]
    fn test_demographics_line() {
        assert_eq!(demographics_line(&face(100.0)), "32 years | Female (93%)");
    }

    #[test]
    fn test_expression_line_uses_dominant() {
        assert_eq!(
            expression_line(&face(100.0)).unwrap(),
            "Neutral (70%)"
        );
    }

    #[test]
    fn test_empty_result_clears_and_presents_only() {
        let (mut r, canvas) = renderer();
        r.render(&[]);
        assert_eq!(canvas.ops(), vec![Op::Clear, Op::Present]);
    }

    #[test]
    fn test_render_draws_each_face() {
        let (mut r, canvas) = renderer();
        r.render(&[face(100.0), face(300.0)]);
        let ops = canvas.ops();
        assert_eq!(ops.first(), Some(&Op::Clear));
        assert_eq!(ops.last(), Some(&Op::Present));
        let boxes = ops.iter().filter(|op| matches!(op, Op::Box(_))).count();
        assert_eq!(boxes, 2);
        assert!(ops.contains(&Op::Box(Some("0.88".into()))));
        assert!(ops.contains(&Op::Landmarks(68)));
    }

    #[test]
    fn test_render_text_positions() {
        let (mut r, canvas) = renderer();
        r.render(&[face(100.0)]);
        let ops = canvas.ops();
        assert!(ops.contains(&Op::Text("32 years | Female (93%)".into(), 50.0, 90.0)));
        assert!(ops.contains(&Op::Text("Neutral (70%)".into(), 50.0, 110.0)));
    }

    #[test]
    fn test_render_text_near_top_uses_fixed_rows() {
        let (mut r, canvas) = renderer();
        r.render(&[face(15.0)]);
        let ops = canvas.ops();
        assert!(ops.contains(&Op::Text("32 years | Female (93%)".into(), 50.0, 20.0)));
        assert!(ops.contains(&Op::Text("Neutral (70%)".into(), 50.0, 40.0)));
    }

    #[test]
    fn test_bars_skip_unlikely_expressions() {
        let (mut r, canvas) = renderer();
        r.render(&[face(100.0)]);
        // happy 0.2 and neutral 0.7 pass, sad 0.1 is at the threshold
        let fills = canvas.ops().iter().filter(|op| **op == Op::Fill).count();
        assert_eq!(fills, 3);
    }

    #[test]
    fn test_match_dimensions_and_remove() {
        let (mut r, canvas) = renderer();
        let size = DisplaySize::new(720, 560);
        r.match_dimensions(size);
        r.remove();
        assert_eq!(canvas.ops(), vec![Op::Resize(size), Op::Remove]);
    }
}
