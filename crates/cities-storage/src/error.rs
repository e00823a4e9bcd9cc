//! Error types for cities-storage

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] cities_core::CoreError),

    #[error("Corrupt record for city {id}: {reason}")]
    CorruptRecord { id: i64, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
