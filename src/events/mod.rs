/// Per-job lifecycle event bridge
///
/// Workers publish job and node lifecycle events onto a process-wide
/// broadcast channel; subscribers (the WebSocket API) filter by job id.
/// Publishing never blocks and never fails the publisher: with no
/// subscribers events are simply dropped.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Started,
    NodeStarted,
    NodeFinished,
    Completed,
    Failed,
}

/// One lifecycle event for a single job
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Process-wide event channel, safe for concurrent use
#[derive(Debug)]
pub struct EventBridge {
    tx: broadcast::Sender<JobEvent>,
}

impl EventBridge {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to the raw event stream; callers filter by job id
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: JobEvent) {
        tracing::debug!(job_id = %event.job_id, kind = ?event.kind, "publishing job event");
        // A send error just means nobody is listening right now.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Publisher handle bound to one job id
///
/// Threaded through the executor so node-level events carry the right job
/// identity without the executor knowing about the queue.
#[derive(Debug, Clone)]
pub struct JobEmitter {
    bridge: Arc<EventBridge>,
    job_id: String,
}

impl JobEmitter {
    pub fn new(bridge: Arc<EventBridge>, job_id: impl Into<String>) -> Self {
        Self { bridge, job_id: job_id.into() }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    fn emit(&self, kind: EventKind, status: &str, result: Option<Value>, error: Option<String>) {
        self.bridge.publish(JobEvent {
            job_id: self.job_id.clone(),
            kind,
            status: status.to_string(),
            result,
            error,
        });
    }

    pub fn started(&self) {
        self.emit(EventKind::Started, "active", None, None);
    }

    pub fn node_started(&self, node_id: &str) {
        self.emit(
            EventKind::NodeStarted,
            "active",
            Some(serde_json::json!({ "nodeId": node_id })),
            None,
        );
    }

    pub fn node_finished(&self, node_id: &str, result: &serde_json::Map<String, Value>) {
        self.emit(
            EventKind::NodeFinished,
            "active",
            Some(serde_json::json!({ "nodeId": node_id, "result": result })),
            None,
        );
    }

    pub fn completed(&self, result: Value) {
        self.emit(EventKind::Completed, "completed", Some(result), None);
    }

    /// `status` distinguishes a retrying failure from a permanent one
    pub fn failed(&self, status: &str, error: &str) {
        self.emit(EventKind::Failed, status, None, Some(error.to_string()));
    }
}
