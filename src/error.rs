/// Typed error taxonomy for the engine and queue layers
///
/// Compile-time failures abort before anything is queued; step failures are
/// fatal to their chain but retried at job granularity; queue errors surface
/// storage problems. The HTTP layer maps these onto status codes.

use thiserror::Error;

/// Errors raised while compiling a flow graph into an action tree
///
/// All of these are fatal: a workflow that fails compilation is never
/// persisted or queued.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("no trigger node found in graph")]
    NoTrigger,

    #[error("graph contains {0} trigger nodes, expected exactly one")]
    MultipleTriggers(usize),

    #[error("edge references unknown node: {0}")]
    UnknownNode(String),

    #[error("graph contains a cycle - workflows must be acyclic")]
    CyclicGraph,

    #[error("parallel branches reconverge at different nodes: {stops:?}")]
    DivergentMerge { stops: Vec<String> },

    #[error("invalid trigger configuration: {0}")]
    InvalidTrigger(String),

    #[error("condition node '{node}' has invalid logic: {reason}")]
    InvalidCondition { node: String, reason: String },

    #[error("node '{node}' has an invalid gate rule: {reason}")]
    InvalidGate { node: String, reason: String },
}

/// Failure of a single node-executor invocation
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("unknown action type: {0}")]
    UnknownType(String),

    #[error("missing required input '{0}'")]
    MissingInput(String),

    #[error("invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sheet operation failed: {0}")]
    Sheet(String),

    #[error("{0}")]
    Failed(String),
}

/// A step failure terminating its chain
///
/// Carries the failing node's identity so job logs and lifecycle events can
/// point at the exact step. Later steps in the same chain are never run.
#[derive(Debug, Error)]
#[error("step '{node_id}' ({action}) failed: {source}")]
pub struct StepError {
    pub node_id: String,
    pub action: String,
    #[source]
    pub source: NodeError,
}

/// Durable-queue storage and delivery errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("job payload could not be (de)serialized: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("no workflow config stored for id: {0}")]
    MissingConfig(String),
}

/// Repeating-schedule registration and removal errors
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("invalid repeat spec: {0}")]
    InvalidSpec(String),

    #[error("no repeating schedule with key: {0}")]
    UnknownKey(String),
}
