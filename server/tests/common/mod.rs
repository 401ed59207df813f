//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use botbridge_server::db::{self, DbPool};
use botbridge_server::store::Store;
use botbridge_server::stream::{StreamConfig, StreamRegistry};

/// Stream tunables compressed for tests: short heartbeats, small queues.
pub fn fast_stream_config() -> StreamConfig {
    StreamConfig {
        write_timeout: Duration::from_millis(100),
        heartbeat_interval: Duration::from_millis(50),
        heartbeat_max_ticks: 3,
        channel_capacity: 8,
    }
}

/// In-memory database plus a registry and store wired together.
pub fn test_store() -> (DbPool, Arc<StreamRegistry>, Arc<Store>) {
    let db = db::init_db_in_memory().expect("in-memory db");
    let streams = StreamRegistry::new(fast_stream_config());
    let store = Store::new(db.clone(), streams.clone());
    (db, streams, store)
}
