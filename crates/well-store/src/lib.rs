//! well-store — SQLite person records and readings, plus the local
//! identity file.

pub mod identity_file;
pub mod sqlite;

pub use identity_file::IdentityFile;
pub use sqlite::{PersonSummary, SqliteStore, StoredReading};

use thiserror::Error;
use well_core::CollabError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt embedding for {id}: {source}")]
    CorruptEmbedding {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<StoreError> for CollabError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Io(e) => CollabError::Unavailable(e.to_string()),
            other => CollabError::Failed(other.to_string()),
        }
    }
}
