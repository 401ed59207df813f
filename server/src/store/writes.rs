//! Write paths. Every insert persists inside `spawn_blocking`, then
//! fires its side effects: a best-effort broadcast to the admin log
//! listeners and incremental upkeep of the per-user aggregate row.
//! Broadcast failures never fail the triggering insert.

use chrono::Utc;
use rusqlite::{params, Connection};

use super::{now_millis, Store, StoreError};
use crate::db::models::{
    LogEntry, NewAuthRecord, NewConversationMessage, NewLogEntry, NewSessionLog, SessionLog,
};
use crate::stream::events::LogFrame;

impl Store {
    /// Persist a request log entry, broadcast it, and bump the user's
    /// aggregate counters if the entry carries a uid. Returns the
    /// assigned id.
    pub async fn insert_log(&self, entry: NewLogEntry) -> Result<i64, StoreError> {
        let db = self.db.clone();
        let ts = entry.timestamp.unwrap_or_else(now_millis);

        let persisted: LogEntry = tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            conn.execute(
                "INSERT INTO request_logs
                     (timestamp, log_type, uid, method, path, status, duration_ms,
                      ip, user_agent, request_body, response_body, extra, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    ts,
                    entry.log_type,
                    entry.uid,
                    entry.method,
                    entry.path,
                    entry.status,
                    entry.duration_ms,
                    entry.ip,
                    entry.user_agent,
                    entry.request_body,
                    entry.response_body,
                    entry.extra,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            let id = conn.last_insert_rowid();

            if let Some(uid) = entry.uid.as_deref() {
                touch_user_in(&conn, uid, ts)?;
            }

            Ok::<LogEntry, StoreError>(LogEntry {
                id,
                timestamp: ts,
                log_type: entry.log_type,
                uid: entry.uid,
                method: entry.method,
                path: entry.path,
                status: entry.status,
                duration_ms: entry.duration_ms,
                ip: entry.ip,
                user_agent: entry.user_agent,
                request_body: entry.request_body,
                response_body: entry.response_body,
                extra: entry.extra,
            })
        })
        .await??;

        let id = persisted.id;
        self.streams.broadcast(LogFrame::Log { data: persisted }).await;
        Ok(id)
    }

    /// Upsert the per-user aggregate row: create with counters at
    /// 1/0/0 on first sight, otherwise bump msg_count and last_seen.
    pub async fn touch_user(&self, uid: &str) -> Result<(), StoreError> {
        let db = self.db.clone();
        let uid = uid.to_string();
        let ts = now_millis();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            touch_user_in(&conn, &uid, ts)
        })
        .await?
    }

    /// Credit token usage from an assistant turn to the user's total.
    /// No-op for a uid that has never produced a log entry.
    pub async fn add_user_tokens(&self, uid: &str, tokens: i64) -> Result<(), StoreError> {
        let db = self.db.clone();
        let uid = uid.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            conn.execute(
                "UPDATE users SET llm_tokens = llm_tokens + ?1 WHERE uid = ?2",
                params![tokens, uid],
            )?;
            Ok(())
        })
        .await?
    }

    /// Persist a conversation turn. Empty content is a no-op, not an
    /// error: returns `None` instead of an id.
    pub async fn insert_conversation_message(
        &self,
        msg: NewConversationMessage,
    ) -> Result<Option<i64>, StoreError> {
        if msg.content.trim().is_empty() {
            return Ok(None);
        }

        let db = self.db.clone();
        let ts = msg.timestamp.unwrap_or_else(now_millis);
        let id = tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            conn.execute(
                "INSERT INTO conversations
                     (uid, timestamp, role, content, msg_type, tokens, duration_ms, log_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    msg.uid,
                    ts,
                    msg.role,
                    msg.content,
                    msg.msg_type,
                    msg.tokens,
                    msg.duration_ms,
                    msg.log_id,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok::<i64, StoreError>(conn.last_insert_rowid())
        })
        .await??;

        Ok(Some(id))
    }

    /// Persist an authentication event. A successful one also bumps the
    /// user's auth_count and last_auth.
    pub async fn insert_auth_record(&self, rec: NewAuthRecord) -> Result<i64, StoreError> {
        let db = self.db.clone();
        let ts = rec.timestamp.unwrap_or_else(now_millis);
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            conn.execute(
                "INSERT INTO auth_records
                     (uid, timestamp, auth_type, ticket, success, ip, user_agent, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    rec.uid,
                    ts,
                    rec.auth_type,
                    rec.ticket,
                    rec.success,
                    rec.ip,
                    rec.user_agent,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            let id = conn.last_insert_rowid();

            if rec.success {
                conn.execute(
                    "UPDATE users SET auth_count = auth_count + 1, last_auth = ?1 WHERE uid = ?2",
                    params![ts, rec.uid],
                )?;
            }

            Ok::<i64, StoreError>(id)
        })
        .await?
    }

    /// Persist one aggregate session record; steps are stored as an
    /// opaque JSON blob. Same side effects as `insert_log`.
    pub async fn insert_session_log(&self, log: NewSessionLog) -> Result<i64, StoreError> {
        let db = self.db.clone();
        let ts = log.timestamp.unwrap_or_else(now_millis);
        let steps_json = serde_json::to_string(&log.steps)?;

        let persisted: SessionLog = tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            conn.execute(
                "INSERT INTO session_logs
                     (uid, timestamp, msg_type, input_content, output_content,
                      total_duration_ms, status, steps, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    log.uid,
                    ts,
                    log.msg_type,
                    log.input_content,
                    log.output_content,
                    log.total_duration_ms,
                    log.status,
                    steps_json,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            let id = conn.last_insert_rowid();

            if let Some(uid) = log.uid.as_deref() {
                touch_user_in(&conn, uid, ts)?;
            }

            Ok::<SessionLog, StoreError>(SessionLog {
                id,
                uid: log.uid,
                timestamp: ts,
                msg_type: log.msg_type,
                input_content: log.input_content,
                output_content: log.output_content,
                total_duration_ms: log.total_duration_ms,
                status: log.status,
                steps: log.steps,
            })
        })
        .await??;

        let id = persisted.id;
        self.streams
            .broadcast(LogFrame::SessionLog { data: persisted })
            .await;
        Ok(id)
    }
}

/// Shared upsert used by every write path that references a uid.
fn touch_user_in(conn: &Connection, uid: &str, ts: i64) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO users (uid, first_seen, last_seen, msg_count, llm_tokens, auth_count, status)
         VALUES (?1, ?2, ?2, 1, 0, 0, 'active')
         ON CONFLICT(uid) DO UPDATE SET
             msg_count = msg_count + 1,
             last_seen = excluded.last_seen",
        params![uid, ts],
    )?;
    Ok(())
}
