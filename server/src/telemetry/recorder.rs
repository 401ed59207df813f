//! Per-request staged telemetry.
//!
//! A recorder lives for the duration of one request: the handler opens
//! and closes named stages around each phase of work, sets the
//! top-level fields as they become known, and commits once at the end.
//! A non-blocking commit never delays the response — the insert is
//! dispatched to a background task and its outcome is visible only in
//! the logs.

use std::sync::Arc;

use crate::db::models::{NewSessionLog, PipelineStep};
use crate::store::Store;

/// Opaque reference to a stage opened by `start_stage`.
#[derive(Debug, Clone, Copy)]
pub struct StageHandle(usize);

#[derive(Debug)]
pub struct PipelineRecorder {
    uid: Option<String>,
    msg_type: Option<String>,
    input_content: Option<String>,
    output_content: Option<String>,
    status: String,
    started_at: i64,
    stages: Vec<PipelineStep>,
}

impl PipelineRecorder {
    pub fn new() -> Self {
        Self {
            uid: None,
            msg_type: None,
            input_content: None,
            output_content: None,
            status: "ok".to_string(),
            started_at: now_millis(),
            stages: Vec::new(),
        }
    }

    pub fn set_uid(&mut self, uid: impl Into<String>) {
        self.uid = Some(uid.into());
    }

    pub fn set_msg_type(&mut self, msg_type: impl Into<String>) {
        self.msg_type = Some(msg_type.into());
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input_content = Some(input.into());
    }

    pub fn set_output(&mut self, output: impl Into<String>) {
        self.output_content = Some(output.into());
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Open a stage with the current time.
    pub fn start_stage(&mut self, name: impl Into<String>) -> StageHandle {
        self.stages.push(PipelineStep {
            stage: name.into(),
            start_time: now_millis(),
            end_time: 0,
            duration_ms: 0,
            success: false,
            data: None,
            error: None,
        });
        StageHandle(self.stages.len() - 1)
    }

    /// Close a stage, computing its duration.
    pub fn end_stage(
        &mut self,
        handle: StageHandle,
        success: bool,
        data: Option<serde_json::Value>,
        error: Option<String>,
    ) {
        let Some(step) = self.stages.get_mut(handle.0) else {
            return;
        };
        step.end_time = now_millis();
        step.duration_ms = step.end_time - step.start_time;
        step.success = success;
        step.data = data;
        step.error = error;
    }

    fn build(self) -> NewSessionLog {
        let now = now_millis();
        NewSessionLog {
            uid: self.uid,
            timestamp: Some(self.started_at),
            msg_type: self.msg_type,
            input_content: self.input_content,
            output_content: self.output_content,
            total_duration_ms: now - self.started_at,
            status: self.status,
            steps: self.stages,
        }
    }

    /// Assemble the session log and insert it. Blocking commits return
    /// the assigned id; non-blocking commits return immediately and the
    /// insert's outcome is observable only via logging.
    pub async fn commit(self, store: Arc<Store>, blocking: bool) -> Option<i64> {
        let log = self.build();
        if blocking {
            match store.insert_session_log(log).await {
                Ok(id) => Some(id),
                Err(err) => {
                    tracing::error!(error = %err, "session log commit failed");
                    None
                }
            }
        } else {
            tokio::spawn(async move {
                if let Err(err) = store.insert_session_log(log).await {
                    tracing::warn!(error = %err, "session log commit failed");
                }
            });
            None
        }
    }
}

impl Default for PipelineRecorder {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
