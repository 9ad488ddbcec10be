//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external systems:
//! - `textdb`: pipe-delimited text files, one per entity type
//! - `sqlite`: SQLite for local storage
//! - `notify`: staff notifications (log or Telegram)
//! - `sanitize`: PII filtering for logs

use std::path::PathBuf;

pub mod notify;
pub mod sanitize;
pub mod sqlite;
pub mod textdb;

pub use textdb::RecordError;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}: {source}")]
    Malformed {
        file: String,
        line: usize,
        #[source]
        source: RecordError,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage lock poisoned")]
    Lock,
}
