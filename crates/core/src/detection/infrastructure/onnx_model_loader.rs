use std::path::PathBuf;
use std::sync::Arc;

use crate::detection::domain::face_analyzer::FaceAnalyzer;
use crate::detection::domain::model_kind::ModelKind;
use crate::detection::domain::model_loader::{ModelLoadError, ModelLoader};
use crate::detection::infrastructure::execution_provider::build_session;
use crate::detection::infrastructure::onnx_face_analyzer::{
    AnalyzerOptions, ModelSessions, OnnxFaceAnalyzer,
};
use crate::shared::model_resolver::{self, ProgressFn};

/// Download progress for a named model: `(model, bytes_downloaded, total_bytes)`.
pub type ModelProgressFn = Arc<dyn Fn(ModelKind, u64, u64) + Send + Sync>;

/// Resolves every model file, then opens one ONNX session per model in
/// [`ModelKind::ALL`] order.
pub struct OnnxModelLoader {
    model_dir: Option<PathBuf>,
    base_url: Option<String>,
    options: AnalyzerOptions,
    progress: Option<ModelProgressFn>,
}

impl OnnxModelLoader {
    pub fn new(model_dir: Option<PathBuf>, base_url: Option<String>, options: AnalyzerOptions) -> Self {
        Self {
            model_dir,
            base_url,
            options,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ModelProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    fn open(&self, kind: ModelKind) -> Result<ort::session::Session, ModelLoadError> {
        let progress: Option<ProgressFn> = self.progress.clone().map(|cb| {
            Box::new(move |done: u64, total: u64| cb(kind, done, total)) as ProgressFn
        });

        let path = model_resolver::resolve(
            &kind.file_name(),
            self.model_dir.as_deref(),
            self.base_url.as_deref(),
            progress,
        )
        .map_err(|e| ModelLoadError::model(kind, e))?;

        let session = build_session(&path).map_err(|e| ModelLoadError::model(kind, e))?;
        log::info!("Loaded {kind} from {}", path.display());
        Ok(session)
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&mut self) -> Result<Box<dyn FaceAnalyzer>, ModelLoadError> {
        let mut sessions = Vec::with_capacity(ModelKind::ALL.len());
        for kind in ModelKind::ALL {
            sessions.push(self.open(kind)?);
        }

        let mut it = sessions.into_iter();
        let mut next = |kind: ModelKind| {
            it.next()
                .ok_or_else(|| ModelLoadError::model(kind, "session missing"))
        };
        let sessions = ModelSessions {
            detector: next(ModelKind::TinyFaceDetector)?,
            landmarks: next(ModelKind::FaceLandmark68)?,
            recognition: next(ModelKind::FaceRecognition)?,
            expressions: next(ModelKind::FaceExpression)?,
            age_gender: next(ModelKind::AgeGender)?,
        };

        log::info!("All {} models loaded", ModelKind::ALL.len());
        Ok(Box::new(OnnxFaceAnalyzer::new(sessions, self.options)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_model_without_url_fails_on_first_model() {
        let empty = TempDir::new().unwrap();
        let mut loader = OnnxModelLoader::new(
            Some(empty.path().to_path_buf()),
            None,
            AnalyzerOptions::default(),
        );
        // The user cache may hold real models on a dev machine; only assert
        // when the first model is genuinely absent.
        let cached = model_resolver::model_cache_dir()
            .map(|d| d.join(ModelKind::TinyFaceDetector.file_name()).exists())
            .unwrap_or(false);
        if cached {
            return;
        }
        match loader.load() {
            Err(ModelLoadError::Model { model, .. }) => {
                assert_eq!(model, ModelKind::TinyFaceDetector)
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected failure"),
        }
    }
}
