//! Tests for the push-stream registry: login handshake lifecycle,
//! heartbeat budget, bounded-time writes, and broadcast isolation.

mod common;

use std::time::Duration;

use futures_util::StreamExt;

use botbridge_server::db::models::LogEntry;
use botbridge_server::stream::events::{
    LogFrame, CODE_CLOSING, CODE_HEARTBEAT, CODE_LOGIN_OK, CODE_READY, CODE_TIMEOUT,
};
use botbridge_server::stream::{PushOutcome, StreamConfig, StreamRegistry};

fn sample_log(id: i64) -> LogEntry {
    LogEntry {
        id,
        timestamp: 1_700_000_000_000 + id,
        log_type: "chat".to_string(),
        uid: Some("user-1".to_string()),
        method: "POST".to_string(),
        path: "/message".to_string(),
        status: 200,
        duration_ms: 12,
        ip: None,
        user_agent: None,
        request_body: None,
        response_body: None,
        extra: None,
    }
}

#[tokio::test(start_paused = true)]
async fn login_channel_delivers_ready_then_success_then_closes() {
    let registry = StreamRegistry::new(common::fast_stream_config());
    let (ticket, mut stream) = registry.open_login_channel();

    let ready = stream.next().await.expect("ready frame");
    assert_eq!(ready.code, CODE_READY);
    assert_eq!(ready.data, serde_json::json!(ticket));

    let outcome = registry.push_login_success(&ticket, "user-9").await;
    assert_eq!(outcome, PushOutcome::Delivered);

    let success = stream.next().await.expect("success frame");
    assert_eq!(success.code, CODE_LOGIN_OK);
    assert_eq!(success.data, serde_json::json!("user-9"));

    let closing = stream.next().await.expect("closing frame");
    assert_eq!(closing.code, CODE_CLOSING);

    // Sender dropped on removal: the stream ends.
    assert!(stream.next().await.is_none());
    assert_eq!(registry.login_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_budget_ends_with_one_timeout_frame() {
    let registry = StreamRegistry::new(common::fast_stream_config());
    let (_ticket, mut stream) = registry.open_login_channel();

    let ready = stream.next().await.expect("ready frame");
    assert_eq!(ready.code, CODE_READY);

    for expected_tick in 1..=3u32 {
        let frame = stream.next().await.expect("heartbeat frame");
        assert_eq!(frame.code, CODE_HEARTBEAT);
        assert_eq!(frame.data, serde_json::json!(expected_tick));
    }

    let timeout = stream.next().await.expect("timeout frame");
    assert_eq!(timeout.code, CODE_TIMEOUT);

    assert!(stream.next().await.is_none());
    assert_eq!(registry.login_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn push_to_aborted_ticket_reports_expired() {
    let registry = StreamRegistry::new(common::fast_stream_config());
    let (ticket, stream) = registry.open_login_channel();
    assert_eq!(registry.login_count(), 1);

    // Client abort: dropping the stream detaches the connection and
    // stops its heartbeat.
    drop(stream);
    assert_eq!(registry.login_count(), 0);

    let outcome = registry.push_login_success(&ticket, "user-9").await;
    assert_eq!(outcome, PushOutcome::Expired);
}

#[tokio::test(start_paused = true)]
async fn stalled_login_client_is_torn_down_by_write_timeout() {
    let registry = StreamRegistry::new(StreamConfig {
        write_timeout: Duration::from_millis(100),
        heartbeat_interval: Duration::from_millis(50),
        heartbeat_max_ticks: 10,
        channel_capacity: 2,
    });
    let (_ticket, stream) = registry.open_login_channel();

    // Never read: ready + one heartbeat fill the queue, the next
    // heartbeat write times out and tears the connection down.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(registry.login_count(), 0);
    drop(stream);
}

#[tokio::test(start_paused = true)]
async fn broadcast_isolates_slow_listeners() {
    let registry = StreamRegistry::new(common::fast_stream_config());

    let (_healthy_id, mut healthy) = registry.open_log_channel();
    let connected = healthy.next().await.expect("connected frame");
    assert!(matches!(connected, LogFrame::Connected { .. }));

    // This listener never reads; its queue still holds the connected
    // acknowledgement.
    let (_slow_id, slow) = registry.open_log_channel();
    assert_eq!(registry.log_client_count(), 2);

    for i in 0..8 {
        registry.broadcast(LogFrame::Log { data: sample_log(i) }).await;
    }

    // The slow listener's queue filled up and it was evicted; the
    // healthy one saw every frame.
    assert_eq!(registry.log_client_count(), 1);
    for i in 0..8 {
        match healthy.next().await.expect("log frame") {
            LogFrame::Log { data } => assert_eq!(data.id, i),
            other => panic!("unexpected frame: {other:?}"),
        }
    }
    drop(slow);
}

#[tokio::test(start_paused = true)]
async fn log_channel_detaches_on_drop() {
    let registry = StreamRegistry::new(common::fast_stream_config());
    let (_id, stream) = registry.open_log_channel();
    assert_eq!(registry.log_client_count(), 1);

    drop(stream);
    assert_eq!(registry.log_client_count(), 0);

    // Broadcasting into an empty registry is a no-op.
    registry.broadcast(LogFrame::Log { data: sample_log(1) }).await;
}
