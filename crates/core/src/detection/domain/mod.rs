pub mod face_analysis;
pub mod face_analyzer;
pub mod labels;
pub mod model_kind;
pub mod model_loader;
