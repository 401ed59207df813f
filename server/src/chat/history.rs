//! Read-through cache of per-user chat transcripts.
//!
//! The cache is the source of truth at runtime; the chat_history table
//! exists so a restart can rebuild it. Histories are append-only apart
//! from an explicit reset, and every new history starts with the
//! configured system preamble.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use rusqlite::params;

use crate::db::models::ChatMessage;
use crate::db::DbPool;
use crate::store::StoreError;

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// Result of scanning a history for the newest assistant turn. The two
/// "not found" outcomes are distinct on purpose: callers phrase their
/// reply differently for a user with no history at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastReply {
    Found(String),
    NoAssistantTurn,
    NoHistory,
}

/// Result of a reset, distinguishing whether there was anything to wipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    NothingToClear,
}

pub struct ChatHistoryCache {
    db: DbPool,
    system_prompt: String,
    histories: DashMap<String, Vec<ChatMessage>>,
}

impl ChatHistoryCache {
    pub fn new(db: DbPool, system_prompt: String) -> Arc<Self> {
        Arc::new(Self {
            db,
            system_prompt,
            histories: DashMap::new(),
        })
    }

    /// Rebuild the cache from persisted rows. Called once at startup.
    /// Returns the number of rows loaded.
    pub async fn hydrate(&self) -> Result<usize, StoreError> {
        let db = self.db.clone();
        let grouped: HashMap<String, Vec<ChatMessage>> =
            tokio::task::spawn_blocking(move || {
                let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
                let mut stmt = conn
                    .prepare("SELECT uid, role, content FROM chat_history ORDER BY uid, id")?;
                let mut grouped: HashMap<String, Vec<ChatMessage>> = HashMap::new();
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        ChatMessage {
                            role: row.get(1)?,
                            content: row.get(2)?,
                        },
                    ))
                })?;
                for row in rows {
                    let (uid, msg) = row?;
                    grouped.entry(uid).or_default().push(msg);
                }
                Ok::<_, StoreError>(grouped)
            })
            .await??;

        let mut loaded = 0;
        for (uid, history) in grouped {
            loaded += history.len();
            self.histories.insert(uid, history);
        }
        tracing::info!(rows = loaded, "chat history hydrated");
        Ok(loaded)
    }

    /// Append one turn to a user's history, seeding the system preamble
    /// first if this is the user's first message. Both the seed and the
    /// appended turn are persisted; returns the full sequence.
    pub async fn append(
        &self,
        uid: &str,
        message: ChatMessage,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let needs_seed = !self.histories.contains_key(uid);

        let db = self.db.clone();
        let persist_uid = uid.to_string();
        let persist_msg = message.clone();
        let seed = needs_seed.then(|| ChatMessage {
            role: ROLE_SYSTEM.to_string(),
            content: self.system_prompt.clone(),
        });
        let seed_for_db = seed.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            if let Some(seed) = seed_for_db {
                conn.execute(
                    "INSERT INTO chat_history (uid, role, content) VALUES (?1, ?2, ?3)",
                    params![persist_uid, seed.role, seed.content],
                )?;
            }
            conn.execute(
                "INSERT INTO chat_history (uid, role, content) VALUES (?1, ?2, ?3)",
                params![persist_uid, persist_msg.role, persist_msg.content],
            )?;
            Ok::<(), StoreError>(())
        })
        .await??;

        let mut history = self.histories.entry(uid.to_string()).or_default();
        if let Some(seed) = seed {
            if history.is_empty() {
                history.push(seed);
            }
        }
        history.push(message);
        Ok(history.value().clone())
    }

    /// Scan a history backward for the most recent assistant turn.
    pub fn last_assistant_reply(&self, uid: &str) -> LastReply {
        match self.histories.get(uid) {
            None => LastReply::NoHistory,
            Some(history) => history
                .iter()
                .rev()
                .find(|m| m.role == ROLE_ASSISTANT)
                .map(|m| LastReply::Found(m.content.clone()))
                .unwrap_or(LastReply::NoAssistantTurn),
        }
    }

    /// Wipe a user's history from both the cache and the table.
    pub async fn clear(&self, uid: &str) -> Result<ClearOutcome, StoreError> {
        let db = self.db.clone();
        let delete_uid = uid.to_string();
        let deleted = tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            let deleted =
                conn.execute("DELETE FROM chat_history WHERE uid = ?1", params![delete_uid])?;
            Ok::<usize, StoreError>(deleted)
        })
        .await??;

        let had_cache = self.histories.remove(uid).is_some();
        if had_cache || deleted > 0 {
            tracing::info!(uid = %uid, rows = deleted, "chat history cleared");
            Ok(ClearOutcome::Cleared)
        } else {
            Ok(ClearOutcome::NothingToClear)
        }
    }

    /// Current in-memory sequence for a uid, if any.
    pub fn history(&self, uid: &str) -> Option<Vec<ChatMessage>> {
        self.histories.get(uid).map(|h| h.value().clone())
    }
}
