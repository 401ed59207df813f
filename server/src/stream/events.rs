//! Wire frames for the two push-stream channels.
//!
//! Login-channel events are named SSE events whose payload is a JSON
//! object `{code, data}`. Log-channel events are plain JSON envelopes
//! tagged by `type`.

use serde::Serialize;

use crate::db::models::{LogEntry, SessionLog};

/// Connection established; data carries the issued ticket.
pub const CODE_READY: i32 = 100;
/// Login confirmed; data carries the authenticated uid.
pub const CODE_LOGIN_OK: i32 = 200;
/// Periodic liveness probe; data carries the tick count.
pub const CODE_HEARTBEAT: i32 = 300;
/// Heartbeat budget exhausted; terminal frame.
pub const CODE_TIMEOUT: i32 = 400;
/// Connection closing notice.
pub const CODE_CLOSING: i32 = -1;

/// SSE event name used for all login-channel frames.
pub const LOGIN_EVENT_NAME: &str = "login";

/// One frame on a login channel.
#[derive(Debug, Clone, Serialize)]
pub struct LoginFrame {
    pub code: i32,
    pub data: serde_json::Value,
}

impl LoginFrame {
    pub fn ready(ticket: &str) -> Self {
        Self {
            code: CODE_READY,
            data: serde_json::json!(ticket),
        }
    }

    pub fn success(uid: &str) -> Self {
        Self {
            code: CODE_LOGIN_OK,
            data: serde_json::json!(uid),
        }
    }

    pub fn heartbeat(tick: u32) -> Self {
        Self {
            code: CODE_HEARTBEAT,
            data: serde_json::json!(tick),
        }
    }

    pub fn timeout() -> Self {
        Self {
            code: CODE_TIMEOUT,
            data: serde_json::Value::Null,
        }
    }

    pub fn closing() -> Self {
        Self {
            code: CODE_CLOSING,
            data: serde_json::Value::Null,
        }
    }
}

/// One envelope on the admin log channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogFrame {
    Connected {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    Log {
        data: LogEntry,
    },
    SessionLog {
        data: SessionLog,
    },
}
