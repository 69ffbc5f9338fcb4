//! [`FaceAnalyzer`] backed by the three ONNX models.

use crate::crop::BoundingBox;
use crate::{FaceDetector, ExpressionClassifier, FaceRecognizer, ModelError};
use std::path::{Path, PathBuf};
use std::time::Instant;
use well_core::{CollabError, Embedding, Emotions, FaceAnalyzer, Frame};

/// Model file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub detector: PathBuf,
    pub recognizer: PathBuf,
    pub expression: PathBuf,
}

impl ModelPaths {
    /// Standard file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            detector: dir.join("version-RFB-320.onnx"),
            recognizer: dir.join("w600k_r50.onnx"),
            expression: dir.join("emotion-ferplus-8.onnx"),
        }
    }

    /// Paths that do not exist on disk.
    pub fn missing(&self) -> Vec<&Path> {
        [&self.detector, &self.recognizer, &self.expression]
            .into_iter()
            .filter(|p| !p.exists())
            .map(PathBuf::as_path)
            .collect()
    }
}

/// Detect, embed and classify on one frame, reusing the detected box.
///
/// The scheduler calls `detect_face`, then `embed` and `classify_emotion`
/// on the same frame; the box from the first call is kept keyed by the
/// frame's capture instant and sequence so detection runs once per frame.
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    expression: ExpressionClassifier,
    last: Option<(FrameKey, Option<BoundingBox>)>,
}

type FrameKey = (Instant, u32);

impl OnnxAnalyzer {
    pub fn load(paths: &ModelPaths) -> Result<Self, ModelError> {
        Ok(Self {
            detector: FaceDetector::load(&paths.detector.to_string_lossy())?,
            recognizer: FaceRecognizer::load(&paths.recognizer.to_string_lossy())?,
            expression: ExpressionClassifier::load(&paths.expression.to_string_lossy())?,
            last: None,
        })
    }

    fn face_box(&mut self, frame: &Frame) -> Result<Option<BoundingBox>, ModelError> {
        let key = (frame.timestamp, frame.sequence);
        if let Some((cached, face)) = self.last {
            if cached == key {
                return Ok(face);
            }
        }

        let face = self.detector.detect(&frame.data, frame.width, frame.height)?;
        if let Some(f) = &face {
            tracing::debug!(confidence = f.confidence, x = f.x, y = f.y, w = f.width, "face detected");
        }
        self.last = Some((key, face));
        Ok(face)
    }

    fn require_face(&mut self, frame: &Frame) -> Result<BoundingBox, CollabError> {
        self.face_box(frame)
            .map_err(to_collab)?
            .ok_or_else(|| CollabError::Failed("no face in frame".to_string()))
    }
}

fn to_collab(e: ModelError) -> CollabError {
    match e {
        ModelError::ModelNotFound(path) => CollabError::Unavailable(path),
        other => CollabError::Failed(other.to_string()),
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn detect_face(&mut self, frame: &Frame) -> Result<bool, CollabError> {
        Ok(self.face_box(frame).map_err(to_collab)?.is_some())
    }

    fn embed(&mut self, frame: &Frame) -> Result<Embedding, CollabError> {
        let face = self.require_face(frame)?;
        self.recognizer
            .extract(&frame.data, frame.width, frame.height, &face)
            .map_err(to_collab)
    }

    fn classify_emotion(&mut self, frame: &Frame) -> Result<Emotions, CollabError> {
        let face = self.require_face(frame)?;
        self.expression
            .classify(&frame.data, frame.width, frame.height, &face)
            .map_err(to_collab)
    }
}
