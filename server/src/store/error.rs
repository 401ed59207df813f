use thiserror::Error;

/// Failures surfaced by store operations. Absence of a row is not an
/// error — lookups return `Option` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("database lock poisoned")]
    LockPoisoned,
}
