//! Event bridge tests: per-job filtering and lifecycle shapes.

use nexusflow::events::{EventBridge, EventKind, JobEmitter};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn subscribers_filter_by_job_id() {
    let bridge = Arc::new(EventBridge::new());
    let mut rx = bridge.subscribe();

    let job_a = JobEmitter::new(Arc::clone(&bridge), "job_a");
    let job_b = JobEmitter::new(Arc::clone(&bridge), "job_b");

    job_a.started();
    job_b.started();
    job_a.completed(json!({ "status": "success" }));

    let mut for_a = Vec::new();
    for _ in 0..3 {
        let event = rx.recv().await.unwrap();
        if event.job_id == "job_a" {
            for_a.push(event);
        }
    }

    assert_eq!(for_a.len(), 2);
    assert_eq!(for_a[0].kind, EventKind::Started);
    assert_eq!(for_a[1].kind, EventKind::Completed);
    assert_eq!(for_a[1].result, Some(json!({ "status": "success" })));
}

#[tokio::test]
async fn node_events_carry_the_node_id() {
    let bridge = Arc::new(EventBridge::new());
    let mut rx = bridge.subscribe();

    let emitter = JobEmitter::new(Arc::clone(&bridge), "job_1");
    emitter.node_started("n1");

    let event = rx.recv().await.unwrap();
    assert_eq!(event.kind, EventKind::NodeStarted);
    assert_eq!(event.result, Some(json!({ "nodeId": "n1" })));
}

#[tokio::test]
async fn failure_events_distinguish_retrying_from_permanent() {
    let bridge = Arc::new(EventBridge::new());
    let mut rx = bridge.subscribe();

    let emitter = JobEmitter::new(Arc::clone(&bridge), "job_1");
    emitter.failed("retrying", "transient");
    emitter.failed("failed", "exhausted");

    let first = rx.recv().await.unwrap();
    assert_eq!(first.status, "retrying");
    assert_eq!(first.error.as_deref(), Some("transient"));

    let second = rx.recv().await.unwrap();
    assert_eq!(second.status, "failed");
}

#[test]
fn events_serialize_with_wire_field_names() {
    let event = nexusflow::events::JobEvent {
        job_id: "job_1".into(),
        kind: EventKind::NodeFinished,
        status: "active".into(),
        result: None,
        error: None,
    };
    let wire = serde_json::to_value(&event).unwrap();
    assert_eq!(wire, json!({ "jobId": "job_1", "type": "node_finished", "status": "active" }));
}
