//! Database row types for all tables.
//! These correspond 1:1 to the SQLite schema defined in migrations.rs.
//! All of them serialize with camelCase keys — the same shapes travel
//! over the admin API and the log-channel broadcast envelopes.

use serde::{Deserialize, Serialize};

/// Request-level audit log entry (request_logs table).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: i64,
    pub timestamp: i64,
    pub log_type: String,
    pub uid: Option<String>,
    pub method: String,
    pub path: String,
    pub status: i64,
    pub duration_ms: i64,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub extra: Option<String>,
}

/// Fields for a log entry about to be inserted; the store assigns the id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLogEntry {
    pub timestamp: Option<i64>,
    pub log_type: String,
    pub uid: Option<String>,
    pub method: String,
    pub path: String,
    pub status: i64,
    #[serde(default)]
    pub duration_ms: i64,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub extra: Option<String>,
}

/// Conversation turn (conversations table).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub id: i64,
    pub uid: String,
    pub timestamp: i64,
    pub role: String,
    pub content: String,
    pub msg_type: Option<String>,
    pub tokens: Option<i64>,
    pub duration_ms: Option<i64>,
    pub log_id: Option<i64>,
}

/// Conversation turn about to be inserted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConversationMessage {
    pub uid: String,
    pub timestamp: Option<i64>,
    pub role: String,
    pub content: String,
    pub msg_type: Option<String>,
    pub tokens: Option<i64>,
    pub duration_ms: Option<i64>,
    pub log_id: Option<i64>,
}

/// Aggregate per-user record (users table, keyed by uid).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub first_seen: i64,
    pub last_seen: i64,
    pub nickname: Option<String>,
    pub msg_count: i64,
    pub llm_tokens: i64,
    pub auth_count: i64,
    pub last_auth: Option<i64>,
    pub status: String,
}

/// Authentication event (auth_records table).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRecord {
    pub id: i64,
    pub uid: String,
    pub timestamp: i64,
    pub auth_type: String,
    pub ticket: Option<String>,
    pub success: bool,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Authentication event about to be inserted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuthRecord {
    pub uid: String,
    pub timestamp: Option<i64>,
    pub auth_type: String,
    pub ticket: Option<String>,
    pub success: bool,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// One named phase of handling a request, with timing and outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStep {
    pub stage: String,
    pub start_time: i64,
    pub end_time: i64,
    pub duration_ms: i64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate telemetry record for one request (session_logs table).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLog {
    pub id: i64,
    pub uid: Option<String>,
    pub timestamp: i64,
    pub msg_type: Option<String>,
    pub input_content: Option<String>,
    pub output_content: Option<String>,
    pub total_duration_ms: i64,
    pub status: String,
    pub steps: Vec<PipelineStep>,
}

/// Session log about to be inserted; assembled by the pipeline recorder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionLog {
    pub uid: Option<String>,
    pub timestamp: Option<i64>,
    pub msg_type: Option<String>,
    pub input_content: Option<String>,
    pub output_content: Option<String>,
    pub total_duration_ms: i64,
    pub status: String,
    pub steps: Vec<PipelineStep>,
}

/// One cached chat turn (chat_history table, minus bookkeeping columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Per-uid rollup returned by the conversation summary query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub uid: String,
    pub message_count: i64,
    pub last_preview: String,
    pub last_timestamp: i64,
}
