//! The persisted store: relational schema plus write-triggered side
//! effects (live broadcast, aggregate user upkeep) and the filtered
//! query family behind the admin surface.
//!
//! All SQLite work runs inside `tokio::task::spawn_blocking`; the
//! connection mutex is only ever held within those closures, never
//! across an await.

pub mod error;
pub mod filters;
pub mod queries;
pub mod writes;

use std::sync::Arc;

use crate::db::DbPool;
use crate::stream::StreamRegistry;

pub use error::StoreError;

pub struct Store {
    pub(crate) db: DbPool,
    pub(crate) streams: Arc<StreamRegistry>,
}

impl Store {
    pub fn new(db: DbPool, streams: Arc<StreamRegistry>) -> Arc<Self> {
        Arc::new(Self { db, streams })
    }
}

/// Current time as unix milliseconds; the timestamp unit used in every
/// table.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
