/// Core workflow type definitions
///
/// Defines the structures flowing through the whole system: the raw flow
/// graph submitted by the canvas, the compiled action tree the executor
/// interprets, the rule trees used by conditions and gates, and the
/// per-run execution context. Everything serializes to JSON for persistence
/// and the HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Node types that act as workflow entry points and are never emitted
/// as executable steps.
pub const TRIGGER_TYPES: [&str; 3] = ["webhook", "timer", "sheets"];

/// A raw node/edge graph as drawn on the canvas
///
/// Invariant (checked by the compiler): exactly one node carries a trigger
/// type, and the edge set describes an acyclic graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

/// A single node in the flow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    /// Unique node identifier within the graph (e.g. "node_3")
    pub id: String,
    /// Action or trigger type string (e.g. "get_price", "webhook")
    #[serde(rename = "type")]
    pub node_type: String,
    /// Node-specific configuration captured by the property form
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// A directed edge between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEdge {
    pub source: String,
    pub target: String,
    /// Output handle label; condition nodes label their outputs
    /// "true" / "false"
    #[serde(default, alias = "sourceHandle")]
    pub handle: Option<String>,
}

impl FlowGraph {
    /// Lookup table from node id to node, used by the recursive compiler
    pub fn node_index(&self) -> HashMap<&str, &FlowNode> {
        self.nodes.iter().map(|n| (n.id.as_str(), n)).collect()
    }
}

/// One executable unit of a compiled action tree
///
/// The compiler emits these in chain order. `Condition` branches terminate
/// the enclosing chain; `Parallel` regions resume it only when every branch
/// halted at the identical merge barrier. Any variant may carry a `gate`
/// rule tree: if it evaluates false at runtime the node (and its subtree)
/// is skipped without error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionNode {
    Step {
        id: String,
        /// Action type resolved against the node registry at runtime
        action: String,
        #[serde(default)]
        inputs: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gate: Option<RuleGroup>,
    },
    Condition {
        id: String,
        rules: RuleGroup,
        #[serde(default)]
        true_branch: Vec<ActionNode>,
        #[serde(default)]
        false_branch: Vec<ActionNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gate: Option<RuleGroup>,
    },
    Parallel {
        /// Synthetic id derived from the fork node ("parallel_<node>")
        id: String,
        branches: Vec<Vec<ActionNode>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gate: Option<RuleGroup>,
    },
}

impl ActionNode {
    pub fn id(&self) -> &str {
        match self {
            ActionNode::Step { id, .. }
            | ActionNode::Condition { id, .. }
            | ActionNode::Parallel { id, .. } => id,
        }
    }

    pub fn gate(&self) -> Option<&RuleGroup> {
        match self {
            ActionNode::Step { gate, .. }
            | ActionNode::Condition { gate, .. }
            | ActionNode::Parallel { gate, .. } => gate.as_ref(),
        }
    }
}

/// Boolean combinator for rule groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Combinator {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// A nested AND/OR tree of comparison rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleGroup {
    pub combinator: Combinator,
    #[serde(default)]
    pub rules: Vec<RuleNode>,
}

/// Either a leaf comparison or a nested group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleNode {
    Group(RuleGroup),
    Rule(Rule),
}

/// A single comparison between two (possibly templated) operands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    pub value_a: Value,
    pub operator: Operator,
    /// Ignored by `is_empty`
    #[serde(default)]
    pub value_b: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "is_empty")]
    IsEmpty,
}

/// How often a timer trigger fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "schedule_type", rename_all = "snake_case")]
pub enum RepeatSpec {
    Cron { pattern: String },
    Interval { minutes: u64 },
}

impl RepeatSpec {
    /// Human-readable pattern for the schedule listing endpoint
    pub fn describe(&self) -> String {
        match self {
            RepeatSpec::Cron { pattern } => pattern.clone(),
            RepeatSpec::Interval { minutes } => format!("Every {} mins", minutes),
        }
    }
}

/// Trigger descriptor persisted alongside the compiled action tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSpec {
    /// Fired externally through the producer endpoint
    Webhook,
    /// Repeating cron or interval schedule
    Timer { schedule: RepeatSpec },
    /// Spreadsheet watcher: each firing processes matching rows
    Sheets {
        /// Column whose value marks a row as pending (default 5)
        #[serde(default)]
        col_index: Option<u32>,
        /// Marker value to match (default "Pending")
        #[serde(default)]
        value: Option<String>,
    },
}

impl TriggerSpec {
    /// Parse a trigger node's config into a descriptor
    ///
    /// Timer nodes must carry a valid cron pattern or interval; anything
    /// else is a compile-time rejection.
    pub fn from_node(node: &FlowNode) -> Result<Self, crate::error::CompileError> {
        use crate::error::CompileError;

        match node.node_type.as_str() {
            "webhook" => Ok(TriggerSpec::Webhook),
            "sheets" => Ok(TriggerSpec::Sheets {
                col_index: node
                    .config
                    .get("colIndex")
                    .and_then(|v| v.as_u64())
                    .map(|v| v as u32),
                value: node
                    .config
                    .get("value")
                    .and_then(|v| v.as_str())
                    .map(String::from),
            }),
            "timer" => {
                let schedule_type = node
                    .config
                    .get("scheduleType")
                    .and_then(|v| v.as_str())
                    .unwrap_or("cron");
                let schedule = match schedule_type {
                    "cron" => {
                        let pattern = node
                            .config
                            .get("cronExpression")
                            .and_then(|v| v.as_str())
                            .filter(|p| !p.is_empty())
                            .ok_or_else(|| {
                                CompileError::InvalidTrigger(
                                    "timer trigger missing cron expression".into(),
                                )
                            })?;
                        RepeatSpec::Cron { pattern: pattern.to_string() }
                    }
                    "interval" => {
                        let minutes = node
                            .config
                            .get("intervalMinutes")
                            .and_then(|v| {
                                v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
                            })
                            .filter(|m| *m > 0)
                            .ok_or_else(|| {
                                CompileError::InvalidTrigger(
                                    "timer trigger missing a positive interval".into(),
                                )
                            })?;
                        RepeatSpec::Interval { minutes }
                    }
                    other => {
                        return Err(CompileError::InvalidTrigger(format!(
                            "unknown schedule type: {}",
                            other
                        )))
                    }
                };
                Ok(TriggerSpec::Timer { schedule })
            }
            other => Err(CompileError::InvalidTrigger(format!(
                "'{}' is not a trigger type",
                other
            ))),
        }
    }

    pub fn is_timer(&self) -> bool {
        matches!(self, TriggerSpec::Timer { .. })
    }
}

/// Workflow-wide settings from the canvas settings modal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    /// Sheet column index (as string) -> friendly variable name
    #[serde(default)]
    pub column_mapping: HashMap<String, String>,
}

/// Persisted workflow configuration
///
/// Stored under its own key, separately from queue entries, so a config
/// edit (hot reload) affects the next firing without touching already
/// enqueued repeat metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub id: String,
    pub workflow_name: String,
    pub trigger: TriggerSpec,
    #[serde(default)]
    pub settings: GlobalSettings,
    pub actions: Vec<ActionNode>,
}

impl WorkflowConfig {
    /// Derive the stable workflow id used for persistence and scheduling
    ///
    /// Timer workflows get a name-derived id so redeploys land on the same
    /// repeating entry; everything else gets a fresh timestamped one. The
    /// uuid suffix keeps same-millisecond triggers from colliding on the
    /// queue's dedupe-by-id insert.
    pub fn derive_id(workflow_name: &str, trigger: &TriggerSpec) -> String {
        if trigger.is_timer() {
            let safe: String = workflow_name
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
                .collect();
            format!("cron_workflow_{}", safe)
        } else {
            format!(
                "job_{}_{}",
                chrono::Utc::now().timestamp_millis(),
                uuid::Uuid::new_v4().simple()
            )
        }
    }
}

/// Per-run key-value store threaded through the action tree
///
/// Holds flat merged step results (last writer wins) and namespaced
/// per-step results under the step's id. Owned exclusively by one job;
/// cloned by value into each parallel branch and re-merged after join.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ExecutionContext(pub Map<String, Value>);

impl ExecutionContext {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Merge a step result flatly (global update) and under the step's id
    /// (namespaced update), matching `{{STEP_ID.KEY}}` template paths.
    pub fn absorb_step(&mut self, step_id: &str, result: Map<String, Value>) {
        for (k, v) in &result {
            self.0.insert(k.clone(), v.clone());
        }
        self.0.insert(step_id.to_string(), Value::Object(result));
    }

    /// Key-overwrite merge used when folding parallel branch contexts back
    /// into the parent. Applied in branch-declaration order, so the last
    /// successful branch wins on collision.
    pub fn merge_from(&mut self, branch: ExecutionContext) {
        for (k, v) in branch.0 {
            self.0.insert(k, v);
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
