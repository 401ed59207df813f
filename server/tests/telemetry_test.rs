//! Tests for the pipeline recorder: stage bookkeeping and the two
//! commit modes.

mod common;

use std::time::Duration;

use botbridge_server::telemetry::PipelineRecorder;

#[tokio::test]
async fn blocking_commit_persists_stages_in_order() {
    let (_db, _streams, store) = common::test_store();

    let mut rec = PipelineRecorder::new();
    rec.set_uid("user-1");
    rec.set_msg_type("text");
    rec.set_input("what is the weather");
    rec.set_output("sunny");

    let recv = rec.start_stage("receive");
    rec.end_stage(recv, true, None, None);
    let llm = rec.start_stage("llm");
    rec.end_stage(llm, true, Some(serde_json::json!({"tokens": 120})), None);
    let reply = rec.start_stage("reply");
    rec.end_stage(reply, false, None, Some("send failed".to_string()));
    rec.set_status("error");

    let id = rec.commit(store.clone(), true).await.expect("assigned id");

    let log = store.get_session_log(id).await.unwrap().expect("row");
    assert_eq!(log.uid.as_deref(), Some("user-1"));
    assert_eq!(log.status, "error");
    assert_eq!(log.input_content.as_deref(), Some("what is the weather"));
    assert_eq!(log.output_content.as_deref(), Some("sunny"));

    let names: Vec<&str> = log.steps.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(names, ["receive", "llm", "reply"]);
    assert!(log.steps[0].success);
    assert_eq!(
        log.steps[1].data,
        Some(serde_json::json!({"tokens": 120}))
    );
    assert_eq!(log.steps[2].error.as_deref(), Some("send failed"));
}

#[tokio::test]
async fn ending_a_stage_twice_keeps_the_last_outcome() {
    let (_db, _streams, store) = common::test_store();

    let mut rec = PipelineRecorder::new();
    let stage = rec.start_stage("work");
    rec.end_stage(stage, false, None, Some("first try".to_string()));
    rec.end_stage(stage, true, None, None);

    let id = rec.commit(store.clone(), true).await.expect("assigned id");
    let log = store.get_session_log(id).await.unwrap().expect("row");
    assert!(log.steps[0].success);
    assert_eq!(log.steps[0].error, None);
}

#[tokio::test]
async fn non_blocking_commit_lands_in_the_background() {
    let (_db, _streams, store) = common::test_store();

    let mut rec = PipelineRecorder::new();
    rec.set_uid("user-1");
    let stage = rec.start_stage("work");
    rec.end_stage(stage, true, None, None);

    // Fire-and-forget: no id comes back.
    assert_eq!(rec.commit(store.clone(), false).await, None);

    // The background insert settles shortly after.
    let mut rows = Vec::new();
    for _ in 0..50 {
        rows = store.query_session_logs(Default::default()).await.unwrap();
        if !rows.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].uid.as_deref(), Some("user-1"));
    assert_eq!(rows[0].steps.len(), 1);
}
