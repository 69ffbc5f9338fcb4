//! FER+ facial expression classifier via ONNX Runtime.

use crate::crop::{self, BoundingBox};
use crate::ModelError;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use well_core::Emotions;

const FERPLUS_INPUT_SIZE: usize = 64;
const FERPLUS_CROP_MARGIN: f32 = 0.0;

/// Output order of the FER+ model. `contempt` has no counterpart in the
/// seven-label vocabulary and is dropped by [`Emotions::from_raw`].
const FERPLUS_LABELS: [&str; 8] = [
    "neutral",
    "happiness",
    "surprise",
    "sadness",
    "anger",
    "disgust",
    "fear",
    "contempt",
];

pub struct ExpressionClassifier {
    session: Session,
}

impl ExpressionClassifier {
    pub fn load(model_path: &str) -> Result<Self, ModelError> {
        if !Path::new(model_path).exists() {
            return Err(ModelError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(1)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, "loaded FER+ model");
        Ok(Self { session })
    }

    /// Emotion scores in percent for the face inside `face`.
    pub fn classify(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        face: &BoundingBox,
    ) -> Result<Emotions, ModelError> {
        let crop = crop::crop_square(
            frame,
            width,
            height,
            face,
            FERPLUS_CROP_MARGIN,
            FERPLUS_INPUT_SIZE as u32,
        )
        .ok_or_else(|| ModelError::InferenceFailed("face box outside frame".to_string()))?;

        let input = Self::preprocess(&crop);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("expression logits: {e}")))?;

        if logits.len() != FERPLUS_LABELS.len() {
            return Err(ModelError::InferenceFailed(format!(
                "expected {} expression scores, got {}",
                FERPLUS_LABELS.len(),
                logits.len()
            )));
        }

        Ok(scores_to_emotions(logits))
    }

    /// FER+ takes raw 0–255 luma, single channel.
    fn preprocess(face_crop: &[u8]) -> Array4<f32> {
        let size = FERPLUS_INPUT_SIZE;
        let mut tensor = Array4::<f32>::zeros((1, 1, size, size));
        for y in 0..size {
            for x in 0..size {
                tensor[[0, 0, y, x]] = face_crop.get(y * size + x).copied().unwrap_or(0) as f32;
            }
        }
        tensor
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

fn scores_to_emotions(logits: &[f32]) -> Emotions {
    let probs = softmax(logits);
    Emotions::from_raw(FERPLUS_LABELS.iter().copied().zip(probs.iter().map(|p| p * 100.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use well_core::EmotionLabel;

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn test_softmax_large_logits() {
        let p = softmax(&[1000.0, 1000.0]);
        assert!((p[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_scores_map_to_labels() {
        let mut logits = [0.0f32; 8];
        logits[1] = 10.0; // happiness
        let emotions = scores_to_emotions(&logits);
        assert_eq!(emotions.dominant(), Some(EmotionLabel::Happy));
        assert!(emotions.get(EmotionLabel::Happy) > 99.0);
    }

    #[test]
    fn test_contempt_dropped() {
        let mut logits = [-20.0f32; 8];
        logits[7] = 20.0;
        let emotions = scores_to_emotions(&logits);
        let total: f32 = emotions.iter().map(|(_, s)| s).sum();
        assert!(total < 0.01);
    }

    #[test]
    fn test_preprocess_raw_pixels() {
        let crop = vec![200u8; FERPLUS_INPUT_SIZE * FERPLUS_INPUT_SIZE];
        let tensor = ExpressionClassifier::preprocess(&crop);
        assert_eq!(tensor.shape(), &[1, 1, 64, 64]);
        assert_eq!(tensor[[0, 0, 10, 10]], 200.0);
    }
}
