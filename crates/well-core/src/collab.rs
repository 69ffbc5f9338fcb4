//! Collaborator seams consumed by the scheduler and the identity resolver.
//!
//! Every call returns an explicit `Result`; the scheduler's cycle
//! classifier is the only place that turns a [`CollabError`] into a
//! [`CycleOutcome`](crate::CycleOutcome).

use crate::emotion::Emotions;
use crate::quality::QualityReport;
use crate::types::{CycleOutcome, Embedding, Frame, Origin, PersonId, Resources};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollabError {
    #[error("call timed out")]
    Timeout,
    #[error("collaborator busy with a previous call")]
    Busy,
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Failed(String),
}

/// Camera frame source. Transient device errors come back as `Ok(None)`.
pub trait FrameSource {
    fn capture(&mut self) -> Result<Option<Frame>, CollabError>;
}

/// Face detection, embedding extraction and emotion classification.
pub trait FaceAnalyzer {
    fn detect_face(&mut self, frame: &Frame) -> Result<bool, CollabError>;
    fn embed(&mut self, frame: &Frame) -> Result<Embedding, CollabError>;
    fn classify_emotion(&mut self, frame: &Frame) -> Result<Emotions, CollabError>;
}

/// Host load and user presence.
pub trait LoadProbe {
    /// Sample CPU, memory and disk usage, in percent.
    fn resources(&mut self) -> Resources;
    /// Whether someone has used mouse or keyboard within the idle timeout.
    fn user_active(&mut self) -> bool;
}

/// Stored reference embeddings, one per person.
pub trait PersonStore {
    /// All persons that have a reference embedding, in a stable order.
    fn list_embeddings(&mut self) -> Result<Vec<(PersonId, Embedding)>, CollabError>;
    fn load_embedding(&mut self, id: &str) -> Result<Option<Embedding>, CollabError>;
    /// Create the person or replace its reference embedding.
    fn upsert_embedding(&mut self, id: &str, embedding: &Embedding) -> Result<(), CollabError>;
}

/// The single "who uses this machine" identifier kept on local disk.
pub trait IdentityCache {
    fn read(&mut self) -> Result<Option<PersonId>, CollabError>;
    fn write(&mut self, id: &str) -> Result<(), CollabError>;
}

/// One persisted row per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub person_id: Option<PersonId>,
    pub captured_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    pub emotions: Option<Emotions>,
    pub resources: Resources,
    pub quality: Option<QualityReport>,
    pub identity_origin: Option<Origin>,
    /// Cosine distance between this cycle's embedding and the person's reference.
    pub face_distance: Option<f32>,
}

/// Where readings go. Failures are logged by the caller and never abort a cycle.
pub trait ReadingSink {
    fn persist(&mut self, reading: &Reading) -> Result<(), CollabError>;
}

macro_rules! forward_mut {
    ($trait:ident { $(fn $name:ident(&mut self $(, $arg:ident: $ty:ty)*) -> $ret:ty;)* }) => {
        impl<T: $trait + ?Sized> $trait for &mut T {
            $(fn $name(&mut self $(, $arg: $ty)*) -> $ret {
                (**self).$name($($arg),*)
            })*
        }
    };
}

forward_mut!(FrameSource {
    fn capture(&mut self) -> Result<Option<Frame>, CollabError>;
});
forward_mut!(FaceAnalyzer {
    fn detect_face(&mut self, frame: &Frame) -> Result<bool, CollabError>;
    fn embed(&mut self, frame: &Frame) -> Result<Embedding, CollabError>;
    fn classify_emotion(&mut self, frame: &Frame) -> Result<Emotions, CollabError>;
});
forward_mut!(LoadProbe {
    fn resources(&mut self) -> Resources;
    fn user_active(&mut self) -> bool;
});
forward_mut!(PersonStore {
    fn list_embeddings(&mut self) -> Result<Vec<(PersonId, Embedding)>, CollabError>;
    fn load_embedding(&mut self, id: &str) -> Result<Option<Embedding>, CollabError>;
    fn upsert_embedding(&mut self, id: &str, embedding: &Embedding) -> Result<(), CollabError>;
});
forward_mut!(IdentityCache {
    fn read(&mut self) -> Result<Option<PersonId>, CollabError>;
    fn write(&mut self, id: &str) -> Result<(), CollabError>;
});
forward_mut!(ReadingSink {
    fn persist(&mut self, reading: &Reading) -> Result<(), CollabError>;
});

/// Time source for the scheduler.
pub trait Clock {
    fn now(&self) -> Instant;
    fn utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
    /// Sleep between cycles. May return early when shutdown is requested.
    fn sleep(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn utc(&self) -> DateTime<Utc> {
        (**self).utc()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Wall clock backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
