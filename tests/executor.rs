//! Chain executor tests: sequential result merging, exclusive condition
//! branches, parallel branch isolation, and rule-gated skipping.

use async_trait::async_trait;
use nexusflow::engine::ChainExecutor;
use nexusflow::error::NodeError;
use nexusflow::events::{EventBridge, JobEmitter};
use nexusflow::nodes::{NodeHandler, NodeRegistry};
use nexusflow::workflow::{ActionNode, ExecutionContext, RuleGroup};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Returns a fixed payload and records every invocation's resolved inputs
struct RecordingHandler {
    payload: Map<String, Value>,
    calls: Arc<Mutex<Vec<Map<String, Value>>>>,
}

#[async_trait]
impl NodeHandler for RecordingHandler {
    async fn run(
        &self,
        inputs: Map<String, Value>,
        _context: &ExecutionContext,
    ) -> Result<Map<String, Value>, NodeError> {
        self.calls.lock().await.push(inputs);
        Ok(self.payload.clone())
    }
}

struct FailingHandler;

#[async_trait]
impl NodeHandler for FailingHandler {
    async fn run(
        &self,
        _inputs: Map<String, Value>,
        _context: &ExecutionContext,
    ) -> Result<Map<String, Value>, NodeError> {
        Err(NodeError::Failed("boom".into()))
    }
}

/// Counts how many times any step ran
struct CountingHandler(Arc<AtomicUsize>);

#[async_trait]
impl NodeHandler for CountingHandler {
    async fn run(
        &self,
        _inputs: Map<String, Value>,
        _context: &ExecutionContext,
    ) -> Result<Map<String, Value>, NodeError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(Map::new())
    }
}

fn payload(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn step(id: &str, action: &str) -> ActionNode {
    ActionNode::Step {
        id: id.into(),
        action: action.into(),
        inputs: Map::new(),
        gate: None,
    }
}

fn step_with_inputs(id: &str, action: &str, inputs: Map<String, Value>) -> ActionNode {
    ActionNode::Step { id: id.into(), action: action.into(), inputs, gate: None }
}

fn rule_group(value_a: &str, operator: &str, value_b: Value) -> RuleGroup {
    serde_json::from_value(json!({
        "combinator": "AND",
        "rules": [{ "valueA": value_a, "operator": operator, "valueB": value_b }],
    }))
    .unwrap()
}

fn emitter() -> JobEmitter {
    JobEmitter::new(Arc::new(EventBridge::new()), "test_job")
}

fn executor(registry: NodeRegistry) -> Arc<ChainExecutor> {
    Arc::new(ChainExecutor::new(Arc::new(registry)))
}

#[tokio::test]
async fn step_result_is_merged_flat_and_namespaced() {
    let mut registry = NodeRegistry::new();
    registry.register(
        "emit_price",
        Arc::new(RecordingHandler {
            payload: payload(&[("PRICE", json!(42.5))]),
            calls: Arc::new(Mutex::new(Vec::new())),
        }),
    );

    let outcome = executor(registry)
        .execute(vec![step("n1", "emit_price")], ExecutionContext::new(), emitter())
        .await
        .unwrap();

    assert_eq!(outcome.context.get("PRICE"), Some(&json!(42.5)));
    assert_eq!(outcome.context.get("n1"), Some(&json!({ "PRICE": 42.5 })));
    assert!(!outcome.is_partial());
}

#[tokio::test]
async fn later_step_sees_resolved_inputs_from_earlier_step() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = NodeRegistry::new();
    registry.register(
        "emit_price",
        Arc::new(RecordingHandler {
            payload: payload(&[("PRICE", json!(7))]),
            calls: Arc::new(Mutex::new(Vec::new())),
        }),
    );
    registry.register(
        "consume",
        Arc::new(RecordingHandler {
            payload: Map::new(),
            calls: Arc::clone(&calls),
        }),
    );

    let consume = step_with_inputs(
        "n2",
        "consume",
        payload(&[("amount", json!("{{n1.PRICE}}")), ("label", json!("price={{PRICE}}"))]),
    );

    executor(registry)
        .execute(vec![step("n1", "emit_price"), consume], ExecutionContext::new(), emitter())
        .await
        .unwrap();

    let calls = calls.lock().await;
    assert_eq!(calls.len(), 1);
    // Exact token keeps the numeric type; interpolation stringifies.
    assert_eq!(calls[0].get("amount"), Some(&json!(7)));
    assert_eq!(calls[0].get("label"), Some(&json!("price=7")));
}

#[tokio::test]
async fn unknown_action_type_fails_the_chain() {
    let outcome = executor(NodeRegistry::new())
        .execute(vec![step("n1", "nonexistent")], ExecutionContext::new(), emitter())
        .await;

    let err = outcome.unwrap_err();
    assert_eq!(err.node_id, "n1");
    assert!(matches!(err.source, NodeError::UnknownType(_)));
}

#[tokio::test]
async fn step_failure_stops_the_sequential_chain() {
    let count = Arc::new(AtomicUsize::new(0));
    let mut registry = NodeRegistry::new();
    registry.register("fail", Arc::new(FailingHandler));
    registry.register("count", Arc::new(CountingHandler(Arc::clone(&count))));

    let result = executor(registry)
        .execute(
            vec![step("n1", "fail"), step("n2", "count")],
            ExecutionContext::new(),
            emitter(),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn condition_runs_exactly_one_branch() {
    let true_count = Arc::new(AtomicUsize::new(0));
    let false_count = Arc::new(AtomicUsize::new(0));
    let mut registry = NodeRegistry::new();
    registry.register("on_true", Arc::new(CountingHandler(Arc::clone(&true_count))));
    registry.register("on_false", Arc::new(CountingHandler(Arc::clone(&false_count))));

    let condition = ActionNode::Condition {
        id: "cond".into(),
        rules: rule_group("{{x}}", ">", json!(10)),
        true_branch: vec![step("yes", "on_true")],
        false_branch: vec![step("no", "on_false")],
        gate: None,
    };

    let mut context = ExecutionContext::new();
    context.insert("x", json!(25));

    executor(registry)
        .execute(vec![condition], context, emitter())
        .await
        .unwrap();

    assert_eq!(true_count.load(Ordering::SeqCst), 1);
    assert_eq!(false_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn gated_step_is_skipped_without_error() {
    let count = Arc::new(AtomicUsize::new(0));
    let mut registry = NodeRegistry::new();
    registry.register("count", Arc::new(CountingHandler(Arc::clone(&count))));

    let gated = ActionNode::Step {
        id: "n1".into(),
        action: "count".into(),
        inputs: Map::new(),
        gate: Some(rule_group("{{x}}", ">", json!(100))),
    };

    let mut context = ExecutionContext::new();
    context.insert("x", json!(5));

    let outcome = executor(registry)
        .execute(vec![gated], context, emitter())
        .await
        .unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(!outcome.is_partial());
}

#[tokio::test]
async fn parallel_branches_merge_into_parent_context() {
    let mut registry = NodeRegistry::new();
    registry.register(
        "left",
        Arc::new(RecordingHandler {
            payload: payload(&[("LEFT", json!("l"))]),
            calls: Arc::new(Mutex::new(Vec::new())),
        }),
    );
    registry.register(
        "right",
        Arc::new(RecordingHandler {
            payload: payload(&[("RIGHT", json!("r"))]),
            calls: Arc::new(Mutex::new(Vec::new())),
        }),
    );

    let parallel = ActionNode::Parallel {
        id: "parallel_t".into(),
        branches: vec![vec![step("b1", "left")], vec![step("b2", "right")]],
        gate: None,
    };

    let outcome = executor(registry)
        .execute(vec![parallel], ExecutionContext::new(), emitter())
        .await
        .unwrap();

    assert_eq!(outcome.context.get("LEFT"), Some(&json!("l")));
    assert_eq!(outcome.context.get("RIGHT"), Some(&json!("r")));
    assert!(!outcome.is_partial());
}

#[tokio::test]
async fn parallel_merge_last_declared_branch_wins() {
    let mut registry = NodeRegistry::new();
    registry.register(
        "first",
        Arc::new(RecordingHandler {
            payload: payload(&[("SHARED", json!("from_first"))]),
            calls: Arc::new(Mutex::new(Vec::new())),
        }),
    );
    registry.register(
        "second",
        Arc::new(RecordingHandler {
            payload: payload(&[("SHARED", json!("from_second"))]),
            calls: Arc::new(Mutex::new(Vec::new())),
        }),
    );

    let parallel = ActionNode::Parallel {
        id: "parallel_t".into(),
        branches: vec![vec![step("b1", "first")], vec![step("b2", "second")]],
        gate: None,
    };

    let outcome = executor(registry)
        .execute(vec![parallel], ExecutionContext::new(), emitter())
        .await
        .unwrap();

    assert_eq!(outcome.context.get("SHARED"), Some(&json!("from_second")));
}

#[tokio::test]
async fn failed_parallel_branch_is_isolated_and_reported() {
    let mut registry = NodeRegistry::new();
    registry.register("fail", Arc::new(FailingHandler));
    registry.register(
        "ok",
        Arc::new(RecordingHandler {
            payload: payload(&[("OK", json!(true))]),
            calls: Arc::new(Mutex::new(Vec::new())),
        }),
    );

    let parallel = ActionNode::Parallel {
        id: "parallel_t".into(),
        branches: vec![vec![step("b1", "fail")], vec![step("b2", "ok")]],
        gate: None,
    };

    let outcome = executor(registry)
        .execute(vec![parallel], ExecutionContext::new(), emitter())
        .await
        .unwrap();

    // The region completes with partial results rather than failing the job.
    assert!(outcome.is_partial());
    assert_eq!(outcome.failed_branches, vec!["parallel_t[0]".to_string()]);
    assert_eq!(outcome.context.get("OK"), Some(&json!(true)));
}

#[tokio::test]
async fn chain_continues_after_partial_parallel_region() {
    let count = Arc::new(AtomicUsize::new(0));
    let mut registry = NodeRegistry::new();
    registry.register("fail", Arc::new(FailingHandler));
    registry.register("count", Arc::new(CountingHandler(Arc::clone(&count))));

    let parallel = ActionNode::Parallel {
        id: "parallel_t".into(),
        branches: vec![vec![step("b1", "fail")], vec![step("b2", "count")]],
        gate: None,
    };

    let outcome = executor(registry)
        .execute(
            vec![parallel, step("after", "count")],
            ExecutionContext::new(),
            emitter(),
        )
        .await
        .unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert!(outcome.is_partial());
}
