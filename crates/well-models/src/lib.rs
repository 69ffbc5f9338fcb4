//! well-models — ONNX Runtime inference for the capture pipeline.
//!
//! UltraFace finds the face, an ArcFace model embeds it and a FER+ model
//! scores its expression. [`OnnxAnalyzer`] ties the three together behind
//! the [`well_core::FaceAnalyzer`] trait.

pub mod analyzer;
pub mod crop;
pub mod detector;
pub mod expression;
pub mod recognizer;

pub use analyzer::{ModelPaths, OnnxAnalyzer};
pub use crop::BoundingBox;
pub use detector::FaceDetector;
pub use expression::ExpressionClassifier;
pub use recognizer::FaceRecognizer;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Default model directory (`/usr/share/well/models`).
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/usr/share/well/models")
}
