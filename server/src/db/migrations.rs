use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: Initial schema

-- Request-level audit log. One row per handled request.
CREATE TABLE request_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    log_type TEXT NOT NULL,
    uid TEXT,
    method TEXT NOT NULL,
    path TEXT NOT NULL,
    status INTEGER NOT NULL,
    duration_ms INTEGER NOT NULL DEFAULT 0,
    ip TEXT,
    user_agent TEXT,
    request_body TEXT,
    response_body TEXT,
    extra TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX idx_request_logs_time ON request_logs(timestamp);
CREATE INDEX idx_request_logs_type ON request_logs(log_type);
CREATE INDEX idx_request_logs_uid ON request_logs(uid);

-- Conversation turns, append-only.
CREATE TABLE conversations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uid TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    msg_type TEXT,
    tokens INTEGER,
    duration_ms INTEGER,
    log_id INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX idx_conversations_uid_time ON conversations(uid, timestamp);

-- One row per uid, maintained incrementally by the store's write paths.
CREATE TABLE users (
    uid TEXT PRIMARY KEY,
    first_seen INTEGER NOT NULL,
    last_seen INTEGER NOT NULL,
    nickname TEXT,
    msg_count INTEGER NOT NULL DEFAULT 0,
    llm_tokens INTEGER NOT NULL DEFAULT 0,
    auth_count INTEGER NOT NULL DEFAULT 0,
    last_auth INTEGER,
    status TEXT NOT NULL DEFAULT 'active'
);
CREATE INDEX idx_users_last_seen ON users(last_seen);

-- Authentication events, append-only.
CREATE TABLE auth_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uid TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    auth_type TEXT NOT NULL,
    ticket TEXT,
    success INTEGER NOT NULL DEFAULT 0,
    ip TEXT,
    user_agent TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX idx_auth_records_uid_time ON auth_records(uid, timestamp);

-- One aggregate record per handled request; steps stored as a JSON blob.
CREATE TABLE session_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uid TEXT,
    timestamp INTEGER NOT NULL,
    msg_type TEXT,
    input_content TEXT,
    output_content TEXT,
    total_duration_ms INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    steps TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX idx_session_logs_uid_time ON session_logs(uid, timestamp);
CREATE INDEX idx_session_logs_status ON session_logs(status);

-- Backing rows for the in-memory chat history cache.
CREATE TABLE chat_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uid TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX idx_chat_history_uid ON chat_history(uid);
",
    )])
}
