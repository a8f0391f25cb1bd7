use thiserror::Error;

use crate::shared::display_size::DisplaySize;

/// Tolerance when checking that expression probabilities sum to 1.
const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

#[derive(Error, Debug, PartialEq)]
pub enum FaceAnalysisError {
    #[error("bounding box is not finite or has negative size: {0:?}")]
    InvalidBox(BoundingBox),
    #[error("{field} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },
    #[error("landmark {index} is not finite")]
    InvalidLandmark { index: usize },
    #[error("expression scores are empty or sum to zero")]
    EmptyExpressions,
    #[error("age must be finite and non-negative, got {0}")]
    InvalidAge(f64),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned face box in pixel coordinates (top-left origin).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }

    fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self::new(self.x * sx, self.y * sy, self.width * sx, self.height * sy)
    }
}

/// Expression label → probability, in a fixed enumeration order.
///
/// The order is the order labels were inserted; it decides ties when
/// selecting the dominant expression.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpressionScores {
    entries: Vec<(String, f64)>,
}

impl ExpressionScores {
    pub fn new<L: Into<String>>(entries: impl IntoIterator<Item = (L, f64)>) -> Self {
        Self {
            entries: entries.into_iter().map(|(l, p)| (l.into(), p)).collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(l, p)| (l.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.iter().find(|(l, _)| *l == label).map(|(_, p)| p)
    }

    /// Label with the highest probability; the first one wins on ties.
    pub fn dominant(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (label, p) in self.iter() {
            match best {
                Some((_, bp)) if p <= bp => {}
                _ => best = Some((label, p)),
            }
        }
        best
    }

    /// Rescales the probabilities so they sum to 1.
    fn normalized(self) -> Result<Self, FaceAnalysisError> {
        let sum: f64 = self.entries.iter().map(|(_, p)| p).sum();
        if self.entries.is_empty() || sum <= 0.0 || !sum.is_finite() {
            return Err(FaceAnalysisError::EmptyExpressions);
        }
        if (sum - 1.0).abs() <= PROBABILITY_SUM_TOLERANCE {
            return Ok(self);
        }
        Ok(Self {
            entries: self
                .entries
                .into_iter()
                .map(|(l, p)| (l, p / sum))
                .collect(),
        })
    }
}

/// Everything the inference backend reports about one face in one tick.
///
/// Records carry no identity across ticks.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceAnalysis {
    pub bbox: BoundingBox,
    pub score: f64,
    pub landmarks: Vec<Point>,
    pub expressions: ExpressionScores,
    pub age: f64,
    pub gender: String,
    pub gender_probability: f64,
}

impl FaceAnalysis {
    /// Validating constructor for records coming from an inference backend.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bbox: BoundingBox,
        score: f64,
        landmarks: Vec<Point>,
        expressions: ExpressionScores,
        age: f64,
        gender: impl Into<String>,
        gender_probability: f64,
    ) -> Result<Self, FaceAnalysisError> {
        if !bbox.is_valid() {
            return Err(FaceAnalysisError::InvalidBox(bbox));
        }
        check_probability("score", score)?;
        check_probability("gender_probability", gender_probability)?;
        for (_, value) in expressions.iter() {
            check_probability("expression", value)?;
        }
        if let Some(index) = landmarks
            .iter()
            .position(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(FaceAnalysisError::InvalidLandmark { index });
        }
        if !age.is_finite() || age < 0.0 {
            return Err(FaceAnalysisError::InvalidAge(age));
        }

        Ok(Self {
            bbox,
            score,
            landmarks,
            expressions: expressions.normalized()?,
            age,
            gender: gender.into(),
            gender_probability,
        })
    }

    /// Maps box and landmarks from `source` pixel space into `display`.
    pub fn resized(&self, source: DisplaySize, display: DisplaySize) -> Self {
        let (sx, sy) = source.scale_to(display);
        Self {
            bbox: self.bbox.scaled(sx, sy),
            landmarks: self
                .landmarks
                .iter()
                .map(|p| Point::new(p.x * sx, p.y * sy))
                .collect(),
            ..self.clone()
        }
    }

    pub fn dominant_expression(&self) -> Option<(&str, f64)> {
        self.expressions.dominant()
    }
}

fn check_probability(field: &'static str, value: f64) -> Result<(), FaceAnalysisError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(FaceAnalysisError::ProbabilityOutOfRange { field, value })
    }
}
