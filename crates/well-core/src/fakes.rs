//! In-memory collaborators for unit tests.

use crate::collab::*;
use crate::emotion::Emotions;
use crate::types::{Embedding, Frame, PersonId, Resources};
use std::cell::Cell;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct MemoryStore {
    pub records: Vec<(PersonId, Option<Embedding>)>,
    pub fail: bool,
    pub upserts: usize,
    /// Ids left out of `list_embeddings`, as if written after the scan.
    pub unlisted: Vec<PersonId>,
}

impl MemoryStore {
    pub fn with(records: Vec<(&str, Option<Embedding>)>) -> Self {
        Self {
            records: records.into_iter().map(|(id, e)| (id.to_string(), e)).collect(),
            ..Default::default()
        }
    }

    fn check(&self) -> Result<(), CollabError> {
        if self.fail {
            Err(CollabError::Timeout)
        } else {
            Ok(())
        }
    }
}

impl PersonStore for MemoryStore {
    fn list_embeddings(&mut self) -> Result<Vec<(PersonId, Embedding)>, CollabError> {
        self.check()?;
        Ok(self
            .records
            .iter()
            .filter(|(id, _)| !self.unlisted.contains(id))
            .filter_map(|(id, e)| e.clone().map(|e| (id.clone(), e)))
            .collect())
    }

    fn load_embedding(&mut self, id: &str) -> Result<Option<Embedding>, CollabError> {
        self.check()?;
        Ok(self
            .records
            .iter()
            .find(|(pid, _)| pid == id)
            .and_then(|(_, e)| e.clone()))
    }

    fn upsert_embedding(&mut self, id: &str, embedding: &Embedding) -> Result<(), CollabError> {
        self.check()?;
        self.upserts += 1;
        match self.records.iter_mut().find(|(pid, _)| pid == id) {
            Some(record) => record.1 = Some(embedding.clone()),
            None => self.records.push((id.to_string(), Some(embedding.clone()))),
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCache {
    pub id: Option<PersonId>,
    pub writes: usize,
}

impl MemoryCache {
    pub fn with(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            writes: 0,
        }
    }
}

impl IdentityCache for MemoryCache {
    fn read(&mut self) -> Result<Option<PersonId>, CollabError> {
        Ok(self.id.clone())
    }

    fn write(&mut self, id: &str) -> Result<(), CollabError> {
        self.writes += 1;
        self.id = Some(id.to_string());
        Ok(())
    }
}

/// Frame source returning a fixed frame, or nothing.
pub struct FakeCamera {
    pub frame: Option<Frame>,
    pub captures: usize,
}

impl FrameSource for FakeCamera {
    fn capture(&mut self) -> Result<Option<Frame>, CollabError> {
        self.captures += 1;
        Ok(self.frame.clone())
    }
}

/// Analyzer that answers from a script of embeddings.
pub struct FakeAnalyzer {
    pub face: bool,
    pub embeddings: VecDeque<Embedding>,
    pub emotions: Result<Emotions, CollabError>,
}

impl FaceAnalyzer for FakeAnalyzer {
    fn detect_face(&mut self, _frame: &Frame) -> Result<bool, CollabError> {
        Ok(self.face)
    }

    fn embed(&mut self, _frame: &Frame) -> Result<Embedding, CollabError> {
        self.embeddings
            .pop_front()
            .ok_or_else(|| CollabError::Unavailable("no embedding scripted".into()))
    }

    fn classify_emotion(&mut self, _frame: &Frame) -> Result<Emotions, CollabError> {
        self.emotions.clone()
    }
}

pub struct FakeProbe {
    pub cpu: f32,
    pub active: bool,
}

impl LoadProbe for FakeProbe {
    fn resources(&mut self) -> Resources {
        Resources {
            cpu: self.cpu,
            memory: 40.0,
            disk: 50.0,
        }
    }

    fn user_active(&mut self) -> bool {
        self.active
    }
}

#[derive(Default)]
pub struct VecSink {
    pub readings: Vec<Reading>,
    pub fail: bool,
}

impl ReadingSink for VecSink {
    fn persist(&mut self, reading: &Reading) -> Result<(), CollabError> {
        if self.fail {
            return Err(CollabError::Failed("disk full".into()));
        }
        self.readings.push(reading.clone());
        Ok(())
    }
}

/// Manually advanced clock. `sleep` advances time instead of blocking.
pub struct FakeClock {
    now: Cell<Instant>,
    pub slept: Cell<Duration>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
            slept: Cell::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.slept.set(duration);
        self.advance(duration);
    }
}
