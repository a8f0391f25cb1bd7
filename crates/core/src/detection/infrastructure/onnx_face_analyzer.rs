/// Face analysis backend using ONNX Runtime via `ort`.
///
/// Runs the tiny face detector on the whole frame, then the landmark,
/// expression and age/gender models on a square crop around each face.
use crate::detection::domain::face_analysis::{
    BoundingBox, ExpressionScores, FaceAnalysis, Point,
};
use crate::detection::domain::face_analyzer::FaceAnalyzer;
use crate::detection::domain::labels::{EXPRESSION_LABELS, GENDER_LABELS};
use crate::shared::constants::{DEFAULT_DETECTOR_INPUT_SIZE, DEFAULT_SCORE_THRESHOLD};
use crate::shared::frame::Frame;

use super::math::{nms, sigmoid, softmax};

/// Fallback input resolution of the per-face models.
const DEFAULT_FACE_INPUT_SIZE: u32 = 112;

/// NMS IoU threshold for the tiny face detector.
const NMS_IOU_THRESH: f64 = 0.4;

/// Values per anchor in the detector output: tx, ty, tw, th, objectness.
const VALUES_PER_ANCHOR: usize = 5;

/// Tiny face detector anchors, in grid-cell units.
const ANCHORS: [(f32, f32); 5] = [
    (1.603_231, 2.094_468),
    (6.041_143, 7.080_126),
    (2.882_459, 3.518_061),
    (4.266_906, 5.178_857),
    (9.041_765, 10.663_08),
];

/// Per-channel RGB mean subtracted before the detector.
const DETECTOR_MEAN_RGB: [f32; 3] = [117.001, 114.697, 97.404];

/// Number of points produced by the landmark model.
const NUM_LANDMARKS: usize = 68;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalyzerOptions {
    /// Detector input resolution (square). Must be a multiple of 32.
    pub input_size: u32,
    pub score_threshold: f64,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_DETECTOR_INPUT_SIZE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

/// Memory layout of a 4-D image tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Layout {
    Nchw,
    Nhwc,
}

/// A loaded model plus the input geometry read from its metadata.
struct ModelSession {
    session: ort::session::Session,
    layout: Layout,
    input_size: u32,
}

impl ModelSession {
    fn new(session: ort::session::Session, fallback_size: u32) -> Self {
        let shape = input_shape(&session);
        let (layout, input_size) = layout_from_shape(shape.as_deref(), fallback_size);
        Self {
            session,
            layout,
            input_size,
        }
    }

    fn run(
        &mut self,
        input: ndarray::Array4<f32>,
    ) -> Result<Vec<OutputTensor>, Box<dyn std::error::Error>> {
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        let mut result = Vec::with_capacity(outputs.len());
        for i in 0..outputs.len() {
            let tensor = outputs[i].try_extract_array::<f32>()?;
            result.push(OutputTensor {
                shape: tensor.shape().to_vec(),
                data: tensor.iter().copied().collect(),
            });
        }
        if result.is_empty() {
            return Err("model produced no outputs".into());
        }
        Ok(result)
    }
}

/// Owned copy of one model output.
#[derive(Clone, Debug)]
struct OutputTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

/// Sessions for the full model set, in load order.
pub struct ModelSessions {
    pub detector: ort::session::Session,
    pub landmarks: ort::session::Session,
    pub recognition: ort::session::Session,
    pub expressions: ort::session::Session,
    pub age_gender: ort::session::Session,
}

pub struct OnnxFaceAnalyzer {
    detector: ModelSession,
    landmarks: ModelSession,
    /// Part of the required model set; descriptors are not computed per tick.
    _recognition: ort::session::Session,
    expressions: ModelSession,
    age_gender: ModelSession,
    options: AnalyzerOptions,
}

impl OnnxFaceAnalyzer {
    pub fn new(sessions: ModelSessions, options: AnalyzerOptions) -> Self {
        let mut detector = ModelSession::new(sessions.detector, options.input_size);
        if detector.input_size != options.input_size {
            log::debug!(
                "Detector input fixed at {} by the model, ignoring configured {}",
                detector.input_size,
                options.input_size
            );
        }
        detector.input_size = detector.input_size.max(32);
        Self {
            detector,
            landmarks: ModelSession::new(sessions.landmarks, DEFAULT_FACE_INPUT_SIZE),
            _recognition: sessions.recognition,
            expressions: ModelSession::new(sessions.expressions, DEFAULT_FACE_INPUT_SIZE),
            age_gender: ModelSession::new(sessions.age_gender, DEFAULT_FACE_INPUT_SIZE),
            options,
        }
    }

    fn detect_faces(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<([f64; 4], f64)>, Box<dyn std::error::Error>> {
        // The detector sees the frame padded bottom/right to a square.
        let side = frame.width().max(frame.height()) as f64;
        let crop = SquareCrop {
            x: 0.0,
            y: 0.0,
            side,
        };
        let size = self.detector.input_size;
        let input = crop_tensor(frame, &crop, size, self.detector.layout, |v, c| {
            (v as f32 - DETECTOR_MEAN_RGB[c]) / 256.0
        });
        let outputs = self.detector.run(input)?;
        let raw = decode_detections(&outputs[0], self.options.score_threshold)?;

        let fw = frame.width() as f64;
        let fh = frame.height() as f64;
        let boxes = raw
            .into_iter()
            .map(|(b, score)| {
                (
                    [
                        (b[0] * side).clamp(0.0, fw),
                        (b[1] * side).clamp(0.0, fh),
                        (b[2] * side).clamp(0.0, fw),
                        (b[3] * side).clamp(0.0, fh),
                    ],
                    score,
                )
            })
            .filter(|(b, _)| b[2] > b[0] && b[3] > b[1])
            .collect();
        Ok(nms(boxes, NMS_IOU_THRESH))
    }

    fn analyze_face(
        &mut self,
        frame: &Frame,
        bbox: [f64; 4],
        score: f64,
    ) -> Result<FaceAnalysis, Box<dyn std::error::Error>> {
        let crop = SquareCrop::around(&bbox);

        let lm_input = face_tensor(frame, &crop, &self.landmarks);
        let lm_out = self.landmarks.run(lm_input)?;
        let landmarks = map_landmarks(&lm_out[0].data, &crop);

        let ex_input = face_tensor(frame, &crop, &self.expressions);
        let ex_out = self.expressions.run(ex_input)?;
        let expressions = parse_expressions(&ex_out[0].data)?;

        let ag_input = face_tensor(frame, &crop, &self.age_gender);
        let ag_out = self.age_gender.run(ag_input)?;
        let (age, gender, gender_probability) = parse_age_gender(&ag_out)?;

        let analysis = FaceAnalysis::new(
            BoundingBox::from_corners(bbox[0], bbox[1], bbox[2], bbox[3]),
            score,
            landmarks,
            expressions,
            age,
            gender,
            gender_probability,
        )?;
        Ok(analysis)
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn analyze(&mut self, frame: &Frame) -> Result<Vec<FaceAnalysis>, Box<dyn std::error::Error>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        let detections = self.detect_faces(frame)?;
        let mut faces = Vec::with_capacity(detections.len());
        for (bbox, score) in detections {
            match self.analyze_face(frame, bbox, score) {
                Ok(face) => faces.push(face),
                Err(e) => log::debug!("Dropping face at {bbox:?}: {e}"),
            }
        }
        Ok(faces)
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Square region of the frame in pixel coordinates; may extend past the
/// frame edges, in which case the overflow is zero-padded.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SquareCrop {
    x: f64,
    y: f64,
    side: f64,
}

impl SquareCrop {
    fn around(bbox: &[f64; 4]) -> Self {
        let w = bbox[2] - bbox[0];
        let h = bbox[3] - bbox[1];
        let side = w.max(h).max(1.0);
        Self {
            x: bbox[0] + (w - side) / 2.0,
            y: bbox[1] + (h - side) / 2.0,
            side,
        }
    }
}

fn face_tensor(frame: &Frame, crop: &SquareCrop, model: &ModelSession) -> ndarray::Array4<f32> {
    crop_tensor(frame, crop, model.input_size, model.layout, |v, _| {
        v as f32 / 255.0
    })
}

/// Nearest-neighbor resample of `crop` to `size × size`.
fn crop_tensor(
    frame: &Frame,
    crop: &SquareCrop,
    size: u32,
    layout: Layout,
    normalize: impl Fn(u8, usize) -> f32,
) -> ndarray::Array4<f32> {
    let s = size as usize;
    let mut tensor = match layout {
        Layout::Nchw => ndarray::Array4::<f32>::zeros((1, 3, s, s)),
        Layout::Nhwc => ndarray::Array4::<f32>::zeros((1, s, s, 3)),
    };
    let step = crop.side / size as f64;
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;

    for ty in 0..s {
        let sy = crop.y + (ty as f64 + 0.5) * step;
        for tx in 0..s {
            let sx = crop.x + (tx as f64 + 0.5) * step;
            let pixel = if sx < 0.0 || sy < 0.0 || sx >= fw || sy >= fh {
                [0u8; 3]
            } else {
                frame.pixel_clamped(sx as i64, sy as i64)
            };
            for (c, &v) in pixel.iter().enumerate() {
                let value = normalize(v, c);
                match layout {
                    Layout::Nchw => tensor[[0, c, ty, tx]] = value,
                    Layout::Nhwc => tensor[[0, ty, tx, c]] = value,
                }
            }
        }
    }

    tensor
}

/// Reads the first input's shape from model metadata.
fn input_shape(session: &ort::session::Session) -> Option<Vec<i64>> {
    session.inputs().first().and_then(|input| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
            Some(shape.iter().copied().collect())
        } else {
            None
        }
    })
}

/// Infers layout and square input size from a 4-D input shape.
///
/// A trailing dimension of 3 means NHWC. Dynamic (non-positive) spatial
/// dimensions fall back to `fallback_size`.
fn layout_from_shape(shape: Option<&[i64]>, fallback_size: u32) -> (Layout, u32) {
    match shape {
        Some(s) if s.len() == 4 && s[3] == 3 => {
            let size = if s[1] > 0 { s[1] as u32 } else { fallback_size };
            (Layout::Nhwc, size)
        }
        Some(s) if s.len() == 4 => {
            let size = if s[2] > 0 { s[2] as u32 } else { fallback_size };
            (Layout::Nchw, size)
        }
        _ => (Layout::Nchw, fallback_size),
    }
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// Decodes the detector grid into `([x1, y1, x2, y2], score)` pairs with
/// coordinates relative to the padded square input (0..1).
///
/// Accepts `[1, G, G, 25]` (channels last) or `[1, 25, G, G]`.
fn decode_detections(
    output: &OutputTensor,
    score_threshold: f64,
) -> Result<Vec<([f64; 4], f64)>, Box<dyn std::error::Error>> {
    let channels = ANCHORS.len() * VALUES_PER_ANCHOR;
    let shape = &output.shape;
    if shape.len() != 4 {
        return Err(format!("Unexpected detector output shape: {shape:?}").into());
    }
    let (grid, channels_last) = if shape[3] == channels {
        (shape[1], true)
    } else if shape[1] == channels {
        (shape[2], false)
    } else {
        return Err(format!("Unexpected detector output shape: {shape:?}").into());
    };
    if output.data.len() < grid * grid * channels {
        return Err("Detector output shorter than its shape".into());
    }

    let at = |row: usize, col: usize, ch: usize| -> f32 {
        if channels_last {
            output.data[(row * grid + col) * channels + ch]
        } else {
            output.data[(ch * grid + row) * grid + col]
        }
    };

    let g = grid as f32;
    let mut dets = Vec::new();
    for row in 0..grid {
        for col in 0..grid {
            for (a, &(aw, ah)) in ANCHORS.iter().enumerate() {
                let base = a * VALUES_PER_ANCHOR;
                let score = sigmoid(at(row, col, base + 4)) as f64;
                if score < score_threshold {
                    continue;
                }
                let cx = (col as f32 + sigmoid(at(row, col, base))) / g;
                let cy = (row as f32 + sigmoid(at(row, col, base + 1))) / g;
                let w = at(row, col, base + 2).exp() * aw / g;
                let h = at(row, col, base + 3).exp() * ah / g;
                dets.push((
                    [
                        (cx - w / 2.0) as f64,
                        (cy - h / 2.0) as f64,
                        (cx + w / 2.0) as f64,
                        (cy + h / 2.0) as f64,
                    ],
                    score,
                ));
            }
        }
    }
    Ok(dets)
}

/// Landmark output is `x0, y0, x1, y1, ...` relative to the crop (0..1).
fn map_landmarks(data: &[f32], crop: &SquareCrop) -> Vec<Point> {
    data.chunks_exact(2)
        .take(NUM_LANDMARKS)
        .map(|p| {
            Point::new(
                crop.x + p[0] as f64 * crop.side,
                crop.y + p[1] as f64 * crop.side,
            )
        })
        .collect()
}

fn parse_expressions(logits: &[f32]) -> Result<ExpressionScores, Box<dyn std::error::Error>> {
    if logits.len() < EXPRESSION_LABELS.len() {
        return Err(format!(
            "Expression model returned {} values, expected {}",
            logits.len(),
            EXPRESSION_LABELS.len()
        )
        .into());
    }
    let probs = softmax(&logits[..EXPRESSION_LABELS.len()]);
    Ok(ExpressionScores::new(
        EXPRESSION_LABELS
            .iter()
            .zip(probs)
            .map(|(label, p)| (*label, p as f64)),
    ))
}

/// Picks the age (1 value) and gender (2 logits) outputs by size.
fn parse_age_gender(
    outputs: &[OutputTensor],
) -> Result<(f64, &'static str, f64), Box<dyn std::error::Error>> {
    let age = outputs
        .iter()
        .find(|o| o.data.len() == 1)
        .map(|o| o.data[0] as f64)
        .ok_or("Age/gender model produced no age output")?;
    let gender_logits = outputs
        .iter()
        .find(|o| o.data.len() == GENDER_LABELS.len())
        .ok_or("Age/gender model produced no gender output")?;

    let probs = softmax(&gender_logits.data);
    let (idx, p) = probs
        .iter()
        .enumerate()
        .fold((0, f32::MIN), |best, (i, &p)| if p > best.1 { (i, p) } else { best });

    Ok((age.max(0.0), GENDER_LABELS[idx], p as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid_output(grid: usize, channels_last: bool, hot: (usize, usize, usize)) -> OutputTensor {
        let channels = ANCHORS.len() * VALUES_PER_ANCHOR;
        let mut data = vec![-10.0f32; grid * grid * channels];
        let (row, col, anchor) = hot;
        let idx = |ch: usize| {
            if channels_last {
                (row * grid + col) * channels + ch
            } else {
                (ch * grid + row) * grid + col
            }
        };
        let base = anchor * VALUES_PER_ANCHOR;
        data[idx(base)] = 0.0; // sigmoid → 0.5
        data[idx(base + 1)] = 0.0;
        data[idx(base + 2)] = 0.0; // exp → 1
        data[idx(base + 3)] = 0.0;
        data[idx(base + 4)] = 5.0; // high objectness
        let shape = if channels_last {
            vec![1, grid, grid, channels]
        } else {
            vec![1, channels, grid, grid]
        };
        OutputTensor { shape, data }
    }

    #[test]
    fn test_decode_channels_last_single_cell() {
        let out = grid_output(13, true, (6, 6, 0));
        let dets = decode_detections(&out, 0.5).unwrap();
        assert_eq!(dets.len(), 1);
        let (b, score) = dets[0];
        // Center of cell 6 in a 13 grid: (6 + 0.5) / 13 = 0.5
        assert_relative_eq!((b[0] + b[2]) / 2.0, 0.5, epsilon = 1e-6);
        assert_relative_eq!(b[2] - b[0], (ANCHORS[0].0 / 13.0) as f64, epsilon = 1e-6);
        assert!(score > 0.99);
    }

    #[test]
    fn test_decode_channels_first_matches_channels_last() {
        let a = decode_detections(&grid_output(13, true, (2, 9, 3)), 0.5).unwrap();
        let b = decode_detections(&grid_output(13, false, (2, 9, 3)), 0.5).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_respects_threshold() {
        let out = grid_output(13, true, (0, 0, 0));
        assert!(decode_detections(&out, 0.999_99).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_unknown_shape() {
        let out = OutputTensor {
            shape: vec![1, 7],
            data: vec![0.0; 7],
        };
        assert!(decode_detections(&out, 0.5).is_err());
    }

    #[test]
    fn test_layout_from_shape() {
        assert_eq!(
            layout_from_shape(Some(&[1, 416, 416, 3]), 320),
            (Layout::Nhwc, 416)
        );
        assert_eq!(
            layout_from_shape(Some(&[1, 3, 112, 112]), 64),
            (Layout::Nchw, 112)
        );
        assert_eq!(
            layout_from_shape(Some(&[1, 3, -1, -1]), 64),
            (Layout::Nchw, 64)
        );
        assert_eq!(layout_from_shape(None, 112), (Layout::Nchw, 112));
    }

    #[test]
    fn test_square_crop_centers_on_box() {
        let crop = SquareCrop::around(&[10.0, 20.0, 50.0, 100.0]);
        assert_relative_eq!(crop.side, 80.0);
        assert_relative_eq!(crop.x, -10.0);
        assert_relative_eq!(crop.y, 20.0);
    }

    #[test]
    fn test_crop_tensor_pads_outside_frame() {
        let frame = Frame::new(vec![255u8; 4 * 4 * 3], 4, 4, 0);
        let crop = SquareCrop {
            x: -4.0,
            y: 0.0,
            side: 8.0,
        };
        let t = crop_tensor(&frame, &crop, 2, Layout::Nchw, |v, _| v as f32 / 255.0);
        assert_eq!(t.shape(), &[1, 3, 2, 2]);
        assert_relative_eq!(t[[0, 0, 0, 0]], 0.0); // left half outside
        assert_relative_eq!(t[[0, 0, 0, 1]], 1.0);
    }

    #[test]
    fn test_crop_tensor_nhwc_shape() {
        let frame = Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, 0);
        let crop = SquareCrop {
            x: 0.0,
            y: 0.0,
            side: 4.0,
        };
        let t = crop_tensor(&frame, &crop, 3, Layout::Nhwc, |v, _| v as f32);
        assert_eq!(t.shape(), &[1, 3, 3, 3]);
    }

    #[test]
    fn test_map_landmarks_to_frame() {
        let crop = SquareCrop {
            x: 100.0,
            y: 50.0,
            side: 200.0,
        };
        let pts = map_landmarks(&[0.0, 0.0, 0.5, 1.0], &crop);
        assert_eq!(pts, vec![Point::new(100.0, 50.0), Point::new(200.0, 250.0)]);
    }

    #[test]
    fn test_parse_expressions_orders_labels() {
        let scores = parse_expressions(&[0.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(scores.len(), 7);
        assert_eq!(scores.iter().next().unwrap().0, "neutral");
        assert_eq!(scores.dominant().unwrap().0, "happy");
    }

    #[test]
    fn test_parse_expressions_too_short() {
        assert!(parse_expressions(&[0.0; 3]).is_err());
    }

    #[test]
    fn test_parse_age_gender() {
        let outputs = vec![
            OutputTensor {
                shape: vec![1, 1],
                data: vec![27.6],
            },
            OutputTensor {
                shape: vec![1, 2],
                data: vec![-2.0, 2.0],
            },
        ];
        let (age, gender, p) = parse_age_gender(&outputs).unwrap();
        assert_relative_eq!(age, 27.6, epsilon = 1e-5);
        assert_eq!(gender, "female");
        assert!(p > 0.9);
    }

    #[test]
    fn test_parse_age_gender_missing_output() {
        let outputs = vec![OutputTensor {
            shape: vec![1, 1],
            data: vec![30.0],
        }];
        assert!(parse_age_gender(&outputs).is_err());
    }
}
