/// Nexusflow: workflow automation engine
///
/// Compiles visual flow graphs into executable action chains, runs them
/// through a durable job queue with retry and repeating schedules, and
/// streams per-job lifecycle events over WebSocket.

// Core configuration and setup
pub mod config;

// Error taxonomy shared across layers
pub mod error;

// Workflow definitions, persistence, and the hot-swappable registry
pub mod workflow;

// Graph compiler, chain executor, variable resolver, and rule evaluator
pub mod engine;

// Durable job queue, repeating scheduler, and worker pool
pub mod queue;

// Per-job lifecycle event bridge
pub mod events;

// Node handler trait and built-in action implementations
pub mod nodes;

// Spreadsheet service seam
pub mod sheets;

// HTTP API layer - REST endpoints and the WebSocket event channel
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use engine::{compile, ChainExecutor, CompiledFlow, RunOutcome};
pub use error::{CompileError, NodeError, QueueError, ScheduleError, StepError};
pub use workflow::{ActionNode, ExecutionContext, FlowGraph, TriggerSpec, WorkflowConfig};
pub use server::start_server;
