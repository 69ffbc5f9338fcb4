//! well-core — capture scheduling and identity resolution.
//!
//! Decides each cycle whether a webcam capture is worth its cost, gates
//! frames on brightness, sharpness and contrast, and works out which
//! enrolled person is in front of the machine. Cameras, models and
//! databases are reached only through the traits in [`collab`].

pub mod collab;
pub mod emotion;
pub mod identity;
pub mod quality;
pub mod scheduler;
pub mod types;

#[cfg(test)]
mod fakes;

pub use collab::{
    Clock, CollabError, FaceAnalyzer, FrameSource, IdentityCache, LoadProbe, PersonStore,
    Reading, ReadingSink, SystemClock,
};
pub use emotion::{EmotionLabel, Emotions};
pub use identity::{IdentityResolver, Resolution, ResolveError, DEFAULT_SIMILARITY_THRESHOLD};
pub use quality::{QualityGate, QualityReport, QualityThresholds, QualityVerdict};
pub use scheduler::{CaptureScheduler, Collaborators, Mode, SchedulerConfig, SchedulerState};
pub use types::{new_person_id, CycleOutcome, Embedding, Frame, Origin, PersonId, Resources};
