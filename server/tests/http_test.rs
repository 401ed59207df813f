//! End-to-end tests over the HTTP surface: a real listener, a real
//! client, and the full login handshake over SSE.

use std::time::Duration;

use futures_util::StreamExt;

use botbridge_server::auth::AuthCodeBroker;
use botbridge_server::chat::ChatHistoryCache;
use botbridge_server::db;
use botbridge_server::routes::build_router;
use botbridge_server::state::AppState;
use botbridge_server::store::Store;
use botbridge_server::stream::{StreamConfig, StreamRegistry};

/// Start a server on an ephemeral port and return its base URL. The
/// heartbeat interval is long so handshake tests see only the frames
/// they provoke.
async fn spawn_server() -> String {
    let db = db::init_db_in_memory().expect("in-memory db");
    let streams = StreamRegistry::new(StreamConfig {
        write_timeout: Duration::from_secs(1),
        heartbeat_interval: Duration::from_secs(30),
        heartbeat_max_ticks: 3,
        channel_capacity: 32,
    });
    let store = Store::new(db.clone(), streams.clone());
    let state = AppState {
        db: db.clone(),
        codes: AuthCodeBroker::new(Duration::from_secs(60)),
        streams,
        store,
        chat: ChatHistoryCache::new(db, "You are a helpful assistant.".to_string()),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

/// Read SSE frames off a byte stream until one complete event (a block
/// ending in a blank line) is available; returns its `data:` payload.
async fn next_sse_data(
    buf: &mut String,
    body: &mut (impl futures_util::Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin),
) -> serde_json::Value {
    loop {
        if let Some(end) = buf.find("\n\n") {
            let block: String = buf.drain(..end + 2).collect();
            if let Some(data) = block.lines().find_map(|l| l.strip_prefix("data: ")) {
                return serde_json::from_str(data).expect("event payload");
            }
            continue;
        }
        let chunk = body.next().await.expect("stream open").expect("chunk");
        buf.push_str(std::str::from_utf8(&chunk).expect("utf8"));
    }
}

#[tokio::test]
async fn code_flow_issues_verifies_and_rejects_reuse() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/auth/code"))
        .json(&serde_json::json!({ "uid": "user-7" }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    let code = body["code"].as_str().expect("code").to_string();
    assert_eq!(code.len(), 6);

    let resp = client
        .post(format!("{base}/api/auth/code/verify"))
        .json(&serde_json::json!({ "code": code }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["uid"], "user-7");

    // Single use.
    let resp = client
        .post(format!("{base}/api/auth/code/verify"))
        .json(&serde_json::json!({ "code": code }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    // The hit left an auth record behind.
    let records: serde_json::Value = client
        .get(format!("{base}/api/admin/auth-records"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert_eq!(records[0]["authType"], "code");
    assert_eq!(records[0]["success"], true);
}

#[tokio::test]
async fn login_handshake_over_sse() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/api/login/stream"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let mut body = resp.bytes_stream();
    let mut buf = String::new();

    let ready = next_sse_data(&mut buf, &mut body).await;
    assert_eq!(ready["code"], 100);
    let ticket = ready["data"].as_str().expect("ticket").to_string();

    // A bogus ticket is gone, not an error.
    let resp = client
        .post(format!("{base}/api/login/confirm"))
        .json(&serde_json::json!({ "ticket": "no-such-ticket", "uid": "user-7" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::GONE);

    let resp = client
        .post(format!("{base}/api/login/confirm"))
        .json(&serde_json::json!({ "ticket": ticket, "uid": "user-7" }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let success = next_sse_data(&mut buf, &mut body).await;
    assert_eq!(success["code"], 200);
    assert_eq!(success["data"], "user-7");

    let closing = next_sse_data(&mut buf, &mut body).await;
    assert_eq!(closing["code"], -1);
}

#[tokio::test]
async fn admin_log_roundtrip_tolerates_malformed_filters() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/admin/logs"))
        .json(&serde_json::json!({
            "logType": "chat",
            "uid": "user-7",
            "method": "POST",
            "path": "/message",
            "status": 200
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    let id = body["id"].as_i64().expect("assigned id");

    // Unparsable limit falls back to the default instead of failing.
    let logs: serde_json::Value = client
        .get(format!("{base}/api/admin/logs?type=chat&limit=abc"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(logs.as_array().unwrap().len(), 1);
    assert_eq!(logs[0]["id"], id);

    // The write also created the user aggregate.
    let user: serde_json::Value = client
        .get(format!("{base}/api/admin/users/user-7"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(user["msgCount"], 1);

    let resp = client
        .get(format!("{base}/api/admin/users/nobody"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chat_history_endpoints_cover_the_lifecycle() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let url = format!("{base}/api/chat/history/user-7");

    // Unknown uid: no history yet.
    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    let history: serde_json::Value = client
        .post(&url)
        .json(&serde_json::json!({ "role": "user", "content": "hello" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // Seeded with the system preamble.
    assert_eq!(history.as_array().unwrap().len(), 2);
    assert_eq!(history[0]["role"], "system");

    let reply: serde_json::Value = client
        .get(format!("{url}/last-reply"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply["reply"], serde_json::Value::Null);
    assert_eq!(reply["status"], "noAssistantTurn");

    client
        .post(&url)
        .json(&serde_json::json!({ "role": "assistant", "content": "hi there" }))
        .send()
        .await
        .unwrap();
    let reply: serde_json::Value = client
        .get(format!("{url}/last-reply"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply["reply"], "hi there");

    let cleared: serde_json::Value = client
        .delete(&url)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["status"], "cleared");
    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}
