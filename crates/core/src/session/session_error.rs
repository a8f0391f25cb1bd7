use thiserror::Error;

use crate::capture::domain::camera_error::CameraError;
use crate::detection::domain::model_loader::ModelLoadError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Models are not loaded yet")]
    ModelsNotReady,
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("Failed to load models: {0}")]
    ModelLoad(#[from] ModelLoadError),
}
