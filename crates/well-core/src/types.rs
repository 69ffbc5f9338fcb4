use serde::{Deserialize, Serialize};
use std::fmt;

/// Added to both norms so a zero vector never divides by zero.
const NORM_EPSILON: f32 = 1e-8;

/// Opaque, globally unique person identifier.
pub type PersonId = String;

/// Mint a fresh person identifier.
pub fn new_person_id() -> PersonId {
    uuid::Uuid::new_v4().to_string()
}

/// A captured 8-bit luma camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: std::time::Instant::now(),
            sequence: 0,
        }
    }

    /// True when the buffer holds exactly `width * height` pixels.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == self.width as usize * self.height as usize
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

/// Face embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Cosine distance `1 - cos(a, b)` in [0, 2]. 0 = same direction.
    ///
    /// An epsilon is added to both norms, so a zero vector is at distance 1
    /// from everything.
    pub fn distance(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = (norm_a.sqrt() + NORM_EPSILON) * (norm_b.sqrt() + NORM_EPSILON);
        1.0 - dot / denom
    }
}

/// How the current person id was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Nearest stored embedding was within threshold.
    DbMatch,
    /// Cached local id confirmed against its reference embedding.
    LocalValid,
    /// Cached local id trusted because it has no reference yet.
    LocalNoReference,
    /// A new person record was enrolled.
    NewIdentity,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::DbMatch => "db_match",
            Origin::LocalValid => "local_valid",
            Origin::LocalNoReference => "local_no_reference",
            Origin::NewIdentity => "new_identity",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened in one scheduler cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    Success,
    Absent,
    LowQuality,
    CpuThrottled,
    Cooldown,
    StreakBackoff,
    Error,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Success => "success",
            CycleOutcome::Absent => "absent",
            CycleOutcome::LowQuality => "low_quality",
            CycleOutcome::CpuThrottled => "cpu_throttled",
            CycleOutcome::Cooldown => "cooldown",
            CycleOutcome::StreakBackoff => "streak_backoff",
            CycleOutcome::Error => "error",
        }
    }

    /// Outcomes that count toward the bad streak.
    pub fn is_bad_signal(&self) -> bool {
        matches!(self, CycleOutcome::Absent | CycleOutcome::LowQuality)
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host resource usage sampled at the start of a cycle, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu: f32,
    pub memory: f32,
    pub disk: f32,
}
