use thiserror::Error;

/// Everything that can go wrong talking to the local database
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, CacheError>;
