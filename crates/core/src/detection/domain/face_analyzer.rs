use crate::detection::domain::face_analysis::FaceAnalysis;
use crate::shared::frame::Frame;

/// Domain interface for the external inference backend.
///
/// One call performs a full pass on a frame: detection, landmarks,
/// expressions and age/gender. Coordinates are in frame pixels.
pub trait FaceAnalyzer: Send {
    fn analyze(&mut self, frame: &Frame) -> Result<Vec<FaceAnalysis>, Box<dyn std::error::Error>>;
}
