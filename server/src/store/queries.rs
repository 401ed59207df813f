//! The filtered query family and detail lookups.
//!
//! WHERE clauses are assembled from the optional filter fields and
//! bound positionally — values never reach the SQL text itself. Results
//! come back newest first; pagination is limit/offset.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::filters::{
    known, page, AuthRecordFilter, ConversationFilter, LogFilter, SessionLogFilter, UserFilter,
    PREVIEW_LEN, SUMMARY_LIMIT,
};
use super::{Store, StoreError};
use crate::db::models::{
    AuthRecord, ConversationMessage, ConversationSummary, LogEntry, PipelineStep, SessionLog,
    UserProfile,
};

const LOG_COLUMNS: &str = "id, timestamp, log_type, uid, method, path, status, duration_ms, \
                           ip, user_agent, request_body, response_body, extra";
const CONVERSATION_COLUMNS: &str =
    "id, uid, timestamp, role, content, msg_type, tokens, duration_ms, log_id";
const USER_COLUMNS: &str =
    "uid, first_seen, last_seen, nickname, msg_count, llm_tokens, auth_count, last_auth, status";
const AUTH_COLUMNS: &str = "id, uid, timestamp, auth_type, ticket, success, ip, user_agent";
const SESSION_COLUMNS: &str = "id, uid, timestamp, msg_type, input_content, output_content, \
                               total_duration_ms, status, steps";

impl Store {
    pub async fn query_logs(&self, filter: LogFilter) -> Result<Vec<LogEntry>, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;

            let mut conds: Vec<&str> = Vec::new();
            let mut values: Vec<Value> = Vec::new();
            if let Some(t) = filter.log_type {
                conds.push("log_type = ?");
                values.push(Value::Text(t));
            }
            if let Some(uid) = filter.uid {
                conds.push("uid = ?");
                values.push(Value::Text(uid));
            }
            if let Some(method) = filter.method {
                conds.push("method = ?");
                values.push(Value::Text(method));
            }
            if let Some(status) = filter.status {
                conds.push("status = ?");
                values.push(Value::Integer(status));
            }
            push_time_range(&mut conds, &mut values, filter.start_time, filter.end_time);

            let (limit, offset) = page(filter.limit, filter.offset);
            let sql = format!(
                "SELECT {LOG_COLUMNS} FROM request_logs{} \
                 ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
                where_clause(&conds)
            );
            values.push(Value::Integer(limit as i64));
            values.push(Value::Integer(offset as i64));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), log_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?
    }

    pub async fn get_log(&self, id: i64) -> Result<Option<LogEntry>, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            let row = conn
                .query_row(
                    &format!("SELECT {LOG_COLUMNS} FROM request_logs WHERE id = ?1"),
                    params![id],
                    log_from_row,
                )
                .optional()?;
            Ok(row)
        })
        .await?
    }

    pub async fn query_conversations_by_user(
        &self,
        uid: &str,
        filter: ConversationFilter,
    ) -> Result<Vec<ConversationMessage>, StoreError> {
        let db = self.db.clone();
        let uid = uid.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;

            let mut conds: Vec<&str> = vec!["uid = ?"];
            let mut values: Vec<Value> = vec![Value::Text(uid)];
            if let Some(role) = known(&filter.role, &["system", "user", "assistant"]) {
                conds.push("role = ?");
                values.push(Value::Text(role.to_string()));
            }
            push_time_range(&mut conds, &mut values, filter.start_time, filter.end_time);

            let (limit, offset) = page(filter.limit, filter.offset);
            let sql = format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations{} \
                 ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
                where_clause(&conds)
            );
            values.push(Value::Integer(limit as i64));
            values.push(Value::Integer(offset as i64));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), conversation_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?
    }

    /// One row per uid: message count, truncated last preview, last
    /// timestamp, newest conversations first.
    pub async fn conversation_summaries(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            let mut stmt = conn.prepare(
                "SELECT c.uid,
                        COUNT(*) AS message_count,
                        (SELECT c2.content FROM conversations c2
                          WHERE c2.uid = c.uid
                          ORDER BY c2.timestamp DESC, c2.id DESC LIMIT 1) AS last_content,
                        MAX(c.timestamp) AS last_timestamp
                 FROM conversations c
                 GROUP BY c.uid
                 ORDER BY last_timestamp DESC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![SUMMARY_LIMIT], |row| {
                    let content: String = row.get(2)?;
                    Ok(ConversationSummary {
                        uid: row.get(0)?,
                        message_count: row.get(1)?,
                        last_preview: truncate_preview(&content),
                        last_timestamp: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?
    }

    pub async fn query_users(&self, filter: UserFilter) -> Result<Vec<UserProfile>, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;

            let mut conds: Vec<&str> = Vec::new();
            let mut values: Vec<Value> = Vec::new();
            if let Some(uid) = filter.uid {
                conds.push("uid = ?");
                values.push(Value::Text(uid));
            }
            if let Some(status) = known(&filter.status, &["active", "banned"]) {
                conds.push("status = ?");
                values.push(Value::Text(status.to_string()));
            }

            let (limit, offset) = page(filter.limit, filter.offset);
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users{} \
                 ORDER BY last_seen DESC LIMIT ? OFFSET ?",
                where_clause(&conds)
            );
            values.push(Value::Integer(limit as i64));
            values.push(Value::Integer(offset as i64));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), user_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?
    }

    pub async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>, StoreError> {
        let db = self.db.clone();
        let uid = uid.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            let row = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE uid = ?1"),
                    params![uid],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
        .await?
    }

    pub async fn query_auth_records(
        &self,
        filter: AuthRecordFilter,
    ) -> Result<Vec<AuthRecord>, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;

            let mut conds: Vec<&str> = Vec::new();
            let mut values: Vec<Value> = Vec::new();
            if let Some(uid) = filter.uid {
                conds.push("uid = ?");
                values.push(Value::Text(uid));
            }
            if let Some(auth_type) = known(&filter.auth_type, &["scan", "code", "verify"]) {
                conds.push("auth_type = ?");
                values.push(Value::Text(auth_type.to_string()));
            }
            if let Some(success) = filter.success {
                conds.push("success = ?");
                values.push(Value::Integer(success as i64));
            }
            push_time_range(&mut conds, &mut values, filter.start_time, filter.end_time);

            let (limit, offset) = page(filter.limit, filter.offset);
            let sql = format!(
                "SELECT {AUTH_COLUMNS} FROM auth_records{} \
                 ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
                where_clause(&conds)
            );
            values.push(Value::Integer(limit as i64));
            values.push(Value::Integer(offset as i64));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), auth_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?
    }

    pub async fn query_session_logs(
        &self,
        filter: SessionLogFilter,
    ) -> Result<Vec<SessionLog>, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;

            let mut conds: Vec<&str> = Vec::new();
            let mut values: Vec<Value> = Vec::new();
            if let Some(uid) = filter.uid {
                conds.push("uid = ?");
                values.push(Value::Text(uid));
            }
            if let Some(status) = filter.status {
                conds.push("status = ?");
                values.push(Value::Text(status));
            }
            if let Some(msg_type) = filter.msg_type {
                conds.push("msg_type = ?");
                values.push(Value::Text(msg_type));
            }
            push_time_range(&mut conds, &mut values, filter.start_time, filter.end_time);

            let (limit, offset) = page(filter.limit, filter.offset);
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM session_logs{} \
                 ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
                where_clause(&conds)
            );
            values.push(Value::Integer(limit as i64));
            values.push(Value::Integer(offset as i64));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), session_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?
    }

    pub async fn get_session_log(&self, id: i64) -> Result<Option<SessionLog>, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            let row = conn
                .query_row(
                    &format!("SELECT {SESSION_COLUMNS} FROM session_logs WHERE id = ?1"),
                    params![id],
                    session_from_row,
                )
                .optional()?;
            Ok(row)
        })
        .await?
    }
}

fn where_clause(conds: &[&str]) -> String {
    if conds.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conds.join(" AND "))
    }
}

fn push_time_range(
    conds: &mut Vec<&str>,
    values: &mut Vec<Value>,
    start: Option<i64>,
    end: Option<i64>,
) {
    if let Some(start) = start {
        conds.push("timestamp >= ?");
        values.push(Value::Integer(start));
    }
    if let Some(end) = end {
        conds.push("timestamp <= ?");
        values.push(Value::Integer(end));
    }
}

fn truncate_preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_LEN {
        content.to_string()
    } else {
        let mut preview: String = content.chars().take(PREVIEW_LEN).collect();
        preview.push_str("...");
        preview
    }
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        log_type: row.get(2)?,
        uid: row.get(3)?,
        method: row.get(4)?,
        path: row.get(5)?,
        status: row.get(6)?,
        duration_ms: row.get(7)?,
        ip: row.get(8)?,
        user_agent: row.get(9)?,
        request_body: row.get(10)?,
        response_body: row.get(11)?,
        extra: row.get(12)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationMessage> {
    Ok(ConversationMessage {
        id: row.get(0)?,
        uid: row.get(1)?,
        timestamp: row.get(2)?,
        role: row.get(3)?,
        content: row.get(4)?,
        msg_type: row.get(5)?,
        tokens: row.get(6)?,
        duration_ms: row.get(7)?,
        log_id: row.get(8)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        uid: row.get(0)?,
        first_seen: row.get(1)?,
        last_seen: row.get(2)?,
        nickname: row.get(3)?,
        msg_count: row.get(4)?,
        llm_tokens: row.get(5)?,
        auth_count: row.get(6)?,
        last_auth: row.get(7)?,
        status: row.get(8)?,
    })
}

fn auth_from_row(row: &Row<'_>) -> rusqlite::Result<AuthRecord> {
    Ok(AuthRecord {
        id: row.get(0)?,
        uid: row.get(1)?,
        timestamp: row.get(2)?,
        auth_type: row.get(3)?,
        ticket: row.get(4)?,
        success: row.get::<_, i64>(5)? != 0,
        ip: row.get(6)?,
        user_agent: row.get(7)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionLog> {
    let steps_json: String = row.get(8)?;
    let steps: Vec<PipelineStep> = serde_json::from_str(&steps_json).unwrap_or_default();
    Ok(SessionLog {
        id: row.get(0)?,
        uid: row.get(1)?,
        timestamp: row.get(2)?,
        msg_type: row.get(3)?,
        input_content: row.get(4)?,
        output_content: row.get(5)?,
        total_duration_ms: row.get(6)?,
        status: row.get(7)?,
        steps,
    })
}
