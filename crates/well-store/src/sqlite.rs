//! SQLite-backed person records and per-cycle readings.

use crate::StoreError;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use well_core::{
    CollabError, EmotionLabel, Embedding, PersonId, PersonStore, Reading, ReadingSink,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS persons (
    person_id     TEXT PRIMARY KEY,
    embedding     TEXT,
    model_version TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS readings (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id       TEXT,
    captured_at     TEXT NOT NULL,
    outcome         TEXT NOT NULL,
    angry           REAL,
    disgust         REAL,
    fear            REAL,
    happy           REAL,
    sad             REAL,
    surprise        REAL,
    neutral         REAL,
    dominant        TEXT NOT NULL,
    cpu             REAL NOT NULL,
    memory          REAL NOT NULL,
    disk            REAL NOT NULL,
    brightness      REAL,
    sharpness       REAL,
    contrast        REAL,
    quality         TEXT,
    identity_origin TEXT,
    face_distance   REAL
);

CREATE INDEX IF NOT EXISTS idx_readings_person ON readings(person_id);
CREATE INDEX IF NOT EXISTS idx_readings_captured_at ON readings(captured_at);
"#;

/// `dominant` value when no emotions were measured.
pub const NO_DOMINANT: &str = "absent";

/// A person row as shown by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonSummary {
    pub person_id: PersonId,
    pub embedding_dim: Option<usize>,
    pub model_version: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A reading row as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredReading {
    pub id: i64,
    pub person_id: Option<PersonId>,
    pub captured_at: String,
    pub outcome: String,
    pub dominant: String,
    pub emotions: Option<[f32; 7]>,
    pub cpu: f32,
    pub memory: f32,
    pub disk: f32,
    pub brightness: Option<f32>,
    pub sharpness: Option<f32>,
    pub contrast: Option<f32>,
    pub quality: Option<String>,
    pub identity_origin: Option<String>,
    pub face_distance: Option<f32>,
}

pub struct SqliteStore {
    conn: Connection,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        // The CLI reads while the daemon writes.
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        Self::initialize(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// All persons in enrollment order.
    pub fn list_persons(&self) -> Result<Vec<PersonSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT person_id, embedding, model_version, created_at, updated_at
             FROM persons ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut persons = Vec::new();
        for row in rows {
            let (person_id, embedding, model_version, created_at, updated_at) = row?;
            let embedding_dim = embedding
                .and_then(|json| serde_json::from_str::<Vec<f32>>(&json).ok())
                .map(|v| v.len());
            persons.push(PersonSummary {
                person_id,
                embedding_dim,
                model_version,
                created_at,
                updated_at,
            });
        }
        Ok(persons)
    }

    /// Most recent readings, newest first.
    pub fn recent_readings(&self, limit: usize) -> Result<Vec<StoredReading>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, person_id, captured_at, outcome,
                    angry, disgust, fear, happy, sad, surprise, neutral,
                    dominant, cpu, memory, disk,
                    brightness, sharpness, contrast, quality,
                    identity_origin, face_distance
             FROM readings ORDER BY id DESC LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map([limit], |row| {
            let mut scores = [0.0f32; 7];
            let mut measured = true;
            for (i, score) in scores.iter_mut().enumerate() {
                match row.get::<_, Option<f64>>(4 + i)? {
                    Some(v) => *score = v as f32,
                    None => measured = false,
                }
            }
            Ok(StoredReading {
                id: row.get(0)?,
                person_id: row.get(1)?,
                captured_at: row.get(2)?,
                outcome: row.get(3)?,
                emotions: measured.then_some(scores),
                dominant: row.get(11)?,
                cpu: row.get::<_, f64>(12)? as f32,
                memory: row.get::<_, f64>(13)? as f32,
                disk: row.get::<_, f64>(14)? as f32,
                brightness: row.get::<_, Option<f64>>(15)?.map(|v| v as f32),
                sharpness: row.get::<_, Option<f64>>(16)?.map(|v| v as f32),
                contrast: row.get::<_, Option<f64>>(17)?.map(|v| v as f32),
                quality: row.get(18)?,
                identity_origin: row.get(19)?,
                face_distance: row.get::<_, Option<f64>>(20)?.map(|v| v as f32),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn load(&self, id: &str) -> Result<Option<Embedding>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT embedding, model_version FROM persons WHERE person_id = ?1",
                [id],
                |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;

        let Some((Some(json), model_version)) = row else {
            return Ok(None);
        };
        let values = serde_json::from_str(&json).map_err(|source| StoreError::CorruptEmbedding {
            id: id.to_string(),
            source,
        })?;
        Ok(Some(Embedding {
            values,
            model_version,
        }))
    }

    fn list(&self) -> Result<Vec<(PersonId, Embedding)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT person_id, embedding, model_version FROM persons
             WHERE embedding IS NOT NULL ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, json, model_version) = row?;
            match serde_json::from_str::<Vec<f32>>(&json) {
                Ok(values) => out.push((id, Embedding { values, model_version })),
                Err(e) => tracing::warn!(person_id = %id, error = %e, "skipping corrupt embedding"),
            }
        }
        Ok(out)
    }

    fn upsert(&self, id: &str, embedding: &Embedding) -> Result<(), StoreError> {
        let json = serde_json::to_string(&embedding.values)?;
        let now = timestamp();
        self.conn.execute(
            "INSERT INTO persons (person_id, embedding, model_version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(person_id) DO UPDATE SET
                 embedding = excluded.embedding,
                 model_version = excluded.model_version,
                 updated_at = excluded.updated_at",
            params![id, json, embedding.model_version, now],
        )?;
        Ok(())
    }

    fn insert_reading(&self, reading: &Reading) -> Result<(), StoreError> {
        let score = |label| reading.emotions.map(|e| e.get(label) as f64);
        let dominant = reading
            .emotions
            .and_then(|e| e.dominant())
            .map_or(NO_DOMINANT, |l| l.as_str());
        let quality = reading.quality.as_ref();

        self.conn.execute(
            "INSERT INTO readings (
                 person_id, captured_at, outcome,
                 angry, disgust, fear, happy, sad, surprise, neutral,
                 dominant, cpu, memory, disk,
                 brightness, sharpness, contrast, quality,
                 identity_origin, face_distance
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                       ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                reading.person_id,
                reading.captured_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                reading.outcome.as_str(),
                score(EmotionLabel::Angry),
                score(EmotionLabel::Disgust),
                score(EmotionLabel::Fear),
                score(EmotionLabel::Happy),
                score(EmotionLabel::Sad),
                score(EmotionLabel::Surprise),
                score(EmotionLabel::Neutral),
                dominant,
                reading.resources.cpu as f64,
                reading.resources.memory as f64,
                reading.resources.disk as f64,
                quality.map(|q| q.brightness as f64),
                quality.map(|q| q.sharpness as f64),
                quality.map(|q| q.contrast as f64),
                quality.map(|q| q.verdict.as_str()),
                reading.identity_origin.map(|o| o.as_str()),
                reading.face_distance.map(|d| d as f64),
            ],
        )?;
        Ok(())
    }
}

impl PersonStore for SqliteStore {
    fn list_embeddings(&mut self) -> Result<Vec<(PersonId, Embedding)>, CollabError> {
        Ok(self.list()?)
    }

    fn load_embedding(&mut self, id: &str) -> Result<Option<Embedding>, CollabError> {
        Ok(self.load(id)?)
    }

    fn upsert_embedding(&mut self, id: &str, embedding: &Embedding) -> Result<(), CollabError> {
        Ok(self.upsert(id, embedding)?)
    }
}

impl ReadingSink for SqliteStore {
    fn persist(&mut self, reading: &Reading) -> Result<(), CollabError> {
        Ok(self.insert_reading(reading)?)
    }
}
