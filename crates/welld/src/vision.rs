//! Camera and inference share one worker thread: a frame never crosses
//! threads between capture and analysis except as a job argument.

use well_core::{CollabError, Embedding, Emotions, FaceAnalyzer, Frame, FrameSource};
use well_hw::WebcamSource;
use well_models::{ModelError, ModelPaths, OnnxAnalyzer};

pub struct Vision {
    camera: WebcamSource,
    analyzer: OnnxAnalyzer,
}

impl Vision {
    pub fn load(camera: WebcamSource, models: &ModelPaths) -> Result<Self, ModelError> {
        let analyzer = OnnxAnalyzer::load(models)?;
        tracing::info!(device = %camera.device_path, "vision worker ready");
        Ok(Self { camera, analyzer })
    }
}

impl FrameSource for Vision {
    fn capture(&mut self) -> Result<Option<Frame>, CollabError> {
        self.camera.capture()
    }
}

impl FaceAnalyzer for Vision {
    fn detect_face(&mut self, frame: &Frame) -> Result<bool, CollabError> {
        self.analyzer.detect_face(frame)
    }

    fn embed(&mut self, frame: &Frame) -> Result<Embedding, CollabError> {
        self.analyzer.embed(frame)
    }

    fn classify_emotion(&mut self, frame: &Frame) -> Result<Emotions, CollabError> {
        self.analyzer.classify_emotion(frame)
    }
}
