use std::sync::Arc;

use crate::auth::AuthCodeBroker;
use crate::chat::ChatHistoryCache;
use crate::db::DbPool;
use crate::store::Store;
use crate::stream::StreamRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Ephemeral login-code bijection
    pub codes: Arc<AuthCodeBroker>,
    /// Live push-stream connections (login + admin log channels)
    pub streams: Arc<StreamRegistry>,
    /// Persisted store with write-triggered side effects
    pub store: Arc<Store>,
    /// Per-user chat transcript cache
    pub chat: Arc<ChatHistoryCache>,
}
