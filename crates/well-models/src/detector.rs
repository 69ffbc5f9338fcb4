//! UltraFace (RFB-320) face detector via ONNX Runtime.
//!
//! The exported model already decodes its anchors: it emits per-anchor
//! `[background, face]` scores and corner boxes normalized to 0–1, so
//! only the best-scoring anchor is needed to answer "is there a face?".

use crate::crop::{self, BoundingBox};
use crate::ModelError;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const ULTRAFACE_WIDTH: u32 = 320;
const ULTRAFACE_HEIGHT: u32 = 240;
const ULTRAFACE_MEAN: f32 = 127.0;
const ULTRAFACE_STD: f32 = 128.0;
pub const ULTRAFACE_CONFIDENCE_THRESHOLD: f32 = 0.7;

pub struct FaceDetector {
    session: Session,
    scores_idx: usize,
    boxes_idx: usize,
    threshold: f32,
}

impl FaceDetector {
    /// Load the UltraFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, ModelError> {
        if !Path::new(model_path).exists() {
            return Err(ModelError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        if output_names.len() < 2 {
            return Err(ModelError::InferenceFailed(format!(
                "UltraFace model requires 2 outputs (scores, boxes), got {}",
                output_names.len()
            )));
        }
        let scores_idx = output_names.iter().position(|n| n == "scores").unwrap_or(0);
        let boxes_idx = output_names.iter().position(|n| n == "boxes").unwrap_or(1);

        tracing::info!(path = model_path, outputs = ?output_names, "loaded UltraFace model");

        Ok(Self {
            session,
            scores_idx,
            boxes_idx,
            threshold: ULTRAFACE_CONFIDENCE_THRESHOLD,
        })
    }

    /// Best face in a grayscale frame, if any scores above the threshold.
    pub fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<BoundingBox>, ModelError> {
        let input = Self::preprocess(frame, width, height)?;
        let (scores_idx, boxes_idx) = (self.scores_idx, self.boxes_idx);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, scores) = outputs[scores_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[boxes_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("boxes: {e}")))?;

        Ok(best_face(scores, boxes, width, height, self.threshold))
    }

    /// Resize to 320x240 and replicate luma into a normalized NCHW tensor.
    fn preprocess(frame: &[u8], width: u32, height: u32) -> Result<Array4<f32>, ModelError> {
        let resized = crop::resize(frame, width, height, ULTRAFACE_WIDTH, ULTRAFACE_HEIGHT)
            .ok_or_else(|| {
                ModelError::InferenceFailed(format!(
                    "frame buffer of {} bytes does not match {width}x{height}",
                    frame.len()
                ))
            })?;

        let (w, h) = (ULTRAFACE_WIDTH as usize, ULTRAFACE_HEIGHT as usize);
        let mut tensor = Array4::<f32>::zeros((1, 3, h, w));
        for y in 0..h {
            for x in 0..w {
                let normalized = (resized[y * w + x] as f32 - ULTRAFACE_MEAN) / ULTRAFACE_STD;
                tensor[[0, 0, y, x]] = normalized;
                tensor[[0, 1, y, x]] = normalized;
                tensor[[0, 2, y, x]] = normalized;
            }
        }
        Ok(tensor)
    }
}

/// Pick the anchor with the highest face score and map its box to pixels.
fn best_face(
    scores: &[f32],
    boxes: &[f32],
    width: u32,
    height: u32,
    threshold: f32,
) -> Option<BoundingBox> {
    let anchors = (scores.len() / 2).min(boxes.len() / 4);
    let (best, confidence) = (0..anchors)
        .map(|i| (i, scores[i * 2 + 1]))
        .fold(None, |acc: Option<(usize, f32)>, (i, s)| match acc {
            Some((_, best)) if best >= s => acc,
            _ => Some((i, s)),
        })?;
    if confidence < threshold {
        return None;
    }

    let (w, h) = (width as f32, height as f32);
    let b = &boxes[best * 4..best * 4 + 4];
    let x1 = (b[0] * w).clamp(0.0, w);
    let y1 = (b[1] * h).clamp(0.0, h);
    let x2 = (b[2] * w).clamp(0.0, w);
    let y2 = (b[3] * h).clamp(0.0, h);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(BoundingBox {
        x: x1,
        y: y1,
        width: x2 - x1,
        height: y2 - y1,
        confidence,
    })
}
