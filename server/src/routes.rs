//! Thin HTTP surface over the coordination core. Handlers translate
//! between transport shapes and core operations; all state lives in the
//! core components.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::chat::{ClearOutcome, LastReply};
use crate::db::models::{
    AuthRecord, ChatMessage, ConversationMessage, ConversationSummary, LogEntry,
    NewAuthRecord, NewConversationMessage, NewLogEntry, SessionLog, UserProfile,
};
use crate::state::AppState;
use crate::store::filters::{
    AuthRecordFilter, ConversationFilter, LogFilter, SessionLogFilter, UserFilter,
};
use crate::store::StoreError;
use crate::stream::events::LOGIN_EVENT_NAME;
use crate::stream::PushOutcome;

// --- Request/Response types ---

#[derive(Debug, Deserialize)]
pub struct IssueCodeRequest {
    pub uid: String,
}

#[derive(Debug, Serialize)]
pub struct IssueCodeResponse {
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    pub code: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyCodeResponse {
    pub uid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmLoginRequest {
    pub ticket: String,
    pub uid: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct AppendChatRequest {
    pub role: String,
    pub content: String,
}

fn internal(err: StoreError) -> StatusCode {
    tracing::error!(error = %err, "store operation failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

// --- Auth code handlers ---

/// POST /api/auth/code
/// Issue (or return the still-live) login code for a uid.
async fn issue_code(
    State(state): State<AppState>,
    Json(body): Json<IssueCodeRequest>,
) -> Json<IssueCodeResponse> {
    let code = state.codes.issue(&body.uid);
    Json(IssueCodeResponse { code })
}

/// POST /api/auth/code/verify
/// Consume a login code. A miss is 404, not an error; a hit records a
/// successful auth event.
async fn verify_code(
    State(state): State<AppState>,
    Json(body): Json<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>, StatusCode> {
    let Some(uid) = state.codes.consume(&body.code) else {
        return Err(StatusCode::NOT_FOUND);
    };

    state
        .store
        .insert_auth_record(NewAuthRecord {
            uid: uid.clone(),
            auth_type: "code".to_string(),
            success: true,
            ip: body.ip,
            user_agent: body.user_agent,
            ..Default::default()
        })
        .await
        .map_err(internal)?;

    Ok(Json(VerifyCodeResponse { uid }))
}

// --- Login stream handlers ---

/// GET /api/login/stream
/// Open a login handshake channel. The first event carries the ticket
/// the client renders as a QR code.
async fn login_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let (_ticket, stream) = state.streams.open_login_channel();
    Sse::new(stream.map(|frame| Event::default().event(LOGIN_EVENT_NAME).json_data(&frame)))
}

/// POST /api/login/confirm
/// Push a scan-confirmed login to the waiting channel.
async fn confirm_login(
    State(state): State<AppState>,
    Json(body): Json<ConfirmLoginRequest>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let outcome = state
        .streams
        .push_login_success(&body.ticket, &body.uid)
        .await;

    let success = outcome == PushOutcome::Delivered;
    state
        .store
        .insert_auth_record(NewAuthRecord {
            uid: body.uid,
            auth_type: "scan".to_string(),
            ticket: Some(body.ticket),
            success,
            ip: body.ip,
            user_agent: body.user_agent,
            ..Default::default()
        })
        .await
        .map_err(internal)?;

    match outcome {
        PushOutcome::Delivered => Ok(Json(StatusResponse { status: "ok" })),
        PushOutcome::Expired => Err(StatusCode::GONE),
        PushOutcome::Failed(_) => Err(StatusCode::BAD_GATEWAY),
    }
}

// --- Admin handlers ---

/// GET /api/admin/logs/stream
/// Live feed of every record the store writes.
async fn admin_log_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let (_client_id, stream) = state.streams.open_log_channel();
    Sse::new(stream.map(|frame| Event::default().json_data(&frame)))
}

/// POST /api/admin/logs — insert a request log entry (used by the bot
/// front end's request middleware).
async fn insert_log(
    State(state): State<AppState>,
    Json(entry): Json<NewLogEntry>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let id = state.store.insert_log(entry).await.map_err(internal)?;
    Ok(Json(serde_json::json!({ "id": id })))
}

/// POST /api/admin/conversations — append a conversation turn. Empty
/// content is accepted and skipped.
async fn insert_conversation(
    State(state): State<AppState>,
    Json(msg): Json<NewConversationMessage>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let id = state
        .store
        .insert_conversation_message(msg)
        .await
        .map_err(internal)?;
    Ok(Json(serde_json::json!({ "id": id })))
}

/// GET /api/admin/logs
async fn query_logs(
    State(state): State<AppState>,
    Query(filter): Query<LogFilter>,
) -> Result<Json<Vec<LogEntry>>, StatusCode> {
    Ok(Json(state.store.query_logs(filter).await.map_err(internal)?))
}

/// GET /api/admin/logs/{id}
async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LogEntry>, StatusCode> {
    state
        .store
        .get_log(id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// GET /api/admin/users
async fn query_users(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<UserProfile>>, StatusCode> {
    Ok(Json(
        state.store.query_users(filter).await.map_err(internal)?,
    ))
}

/// GET /api/admin/users/{uid}
async fn get_user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<UserProfile>, StatusCode> {
    state
        .store
        .get_user(&uid)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// GET /api/admin/auth-records
async fn query_auth_records(
    State(state): State<AppState>,
    Query(filter): Query<AuthRecordFilter>,
) -> Result<Json<Vec<AuthRecord>>, StatusCode> {
    Ok(Json(
        state
            .store
            .query_auth_records(filter)
            .await
            .map_err(internal)?,
    ))
}

/// GET /api/admin/session-logs
async fn query_session_logs(
    State(state): State<AppState>,
    Query(filter): Query<SessionLogFilter>,
) -> Result<Json<Vec<SessionLog>>, StatusCode> {
    Ok(Json(
        state
            .store
            .query_session_logs(filter)
            .await
            .map_err(internal)?,
    ))
}

/// GET /api/admin/session-logs/{id}
async fn get_session_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SessionLog>, StatusCode> {
    state
        .store
        .get_session_log(id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// GET /api/admin/conversations/{uid}
async fn query_conversations(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Query(filter): Query<ConversationFilter>,
) -> Result<Json<Vec<ConversationMessage>>, StatusCode> {
    Ok(Json(
        state
            .store
            .query_conversations_by_user(&uid, filter)
            .await
            .map_err(internal)?,
    ))
}

/// GET /api/admin/conversations
async fn conversation_summaries(
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversationSummary>>, StatusCode> {
    Ok(Json(
        state
            .store
            .conversation_summaries()
            .await
            .map_err(internal)?,
    ))
}

// --- Chat history handlers ---

/// POST /api/chat/history/{uid} — append a turn, returning the full
/// sequence (seeded with the system preamble on first use).
async fn append_chat(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(body): Json<AppendChatRequest>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    let history = state
        .chat
        .append(
            &uid,
            ChatMessage {
                role: body.role,
                content: body.content,
            },
        )
        .await
        .map_err(internal)?;
    Ok(Json(history))
}

/// GET /api/chat/history/{uid}
async fn get_chat_history(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    state.chat.history(&uid).map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// GET /api/chat/history/{uid}/last-reply
/// The two "not found" shapes are distinct: no history at all versus a
/// history with no assistant turn yet.
async fn last_assistant_reply(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Json<serde_json::Value> {
    let body = match state.chat.last_assistant_reply(&uid) {
        LastReply::Found(content) => serde_json::json!({ "reply": content }),
        LastReply::NoAssistantTurn => {
            serde_json::json!({ "reply": null, "status": "noAssistantTurn" })
        }
        LastReply::NoHistory => serde_json::json!({ "reply": null, "status": "noHistory" }),
    };
    Json(body)
}

/// DELETE /api/chat/history/{uid}
async fn clear_chat(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let outcome = state.chat.clear(&uid).await.map_err(internal)?;
    let status = match outcome {
        ClearOutcome::Cleared => "cleared",
        ClearOutcome::NothingToClear => "nothingToClear",
    };
    Ok(Json(StatusResponse { status }))
}

/// Build the full axum Router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/code", post(issue_code))
        .route("/api/auth/code/verify", post(verify_code))
        .route("/api/login/stream", get(login_stream))
        .route("/api/login/confirm", post(confirm_login))
        .route("/api/admin/logs/stream", get(admin_log_stream))
        .route("/api/admin/logs", get(query_logs).post(insert_log))
        .route("/api/admin/logs/{id}", get(get_log))
        .route("/api/admin/users", get(query_users))
        .route("/api/admin/users/{uid}", get(get_user))
        .route("/api/admin/auth-records", get(query_auth_records))
        .route("/api/admin/session-logs", get(query_session_logs))
        .route("/api/admin/session-logs/{id}", get(get_session_log))
        .route(
            "/api/admin/conversations",
            get(conversation_summaries).post(insert_conversation),
        )
        .route("/api/admin/conversations/{uid}", get(query_conversations))
        .route(
            "/api/chat/history/{uid}",
            get(get_chat_history).post(append_chat).delete(clear_chat),
        )
        .route("/api/chat/history/{uid}/last-reply", get(last_assistant_reply))
        .with_state(state)
}
