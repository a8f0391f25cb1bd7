use crate::shared::constants::MODEL_EXTENSION;

/// The five models that must be loaded before detection can start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelKind {
    TinyFaceDetector,
    FaceLandmark68,
    FaceRecognition,
    FaceExpression,
    AgeGender,
}

impl ModelKind {
    /// Fixed load order.
    pub const ALL: [ModelKind; 5] = [
        ModelKind::TinyFaceDetector,
        ModelKind::FaceLandmark68,
        ModelKind::FaceRecognition,
        ModelKind::FaceExpression,
        ModelKind::AgeGender,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::TinyFaceDetector => "tiny_face_detector",
            ModelKind::FaceLandmark68 => "face_landmark_68",
            ModelKind::FaceRecognition => "face_recognition",
            ModelKind::FaceExpression => "face_expression",
            ModelKind::AgeGender => "age_gender",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.{MODEL_EXTENSION}", self.name())
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
