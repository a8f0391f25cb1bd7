use thiserror::Error;

use crate::detection::domain::face_analyzer::FaceAnalyzer;
use crate::detection::domain::model_kind::ModelKind;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("failed to load {model}: {message}")]
    Model { model: ModelKind, message: String },
    #[error("model loading failed earlier: {0}")]
    PreviouslyFailed(String),
}

impl ModelLoadError {
    pub fn model(model: ModelKind, err: impl std::fmt::Display) -> Self {
        Self::Model {
            model,
            message: err.to_string(),
        }
    }
}

/// Loads the full model set and hands back a ready inference backend.
///
/// Succeeds only when every entry of [`ModelKind::ALL`] loaded; any single
/// failure is reported as the overall result.
pub trait ModelLoader: Send {
    fn load(&mut self) -> Result<Box<dyn FaceAnalyzer>, ModelLoadError>;
}
