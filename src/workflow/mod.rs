/// Workflow management layer
///
/// Type definitions for graphs, action trees and configs, SQLite
/// persistence, and the hot-swap in-memory registry.

pub mod registry;
pub mod storage;
pub mod types;

pub use registry::ConfigRegistry;
pub use storage::ConfigStore;
pub use types::{
    ActionNode, ExecutionContext, FlowEdge, FlowGraph, FlowNode, GlobalSettings, RepeatSpec,
    RuleGroup, TriggerSpec, WorkflowConfig,
};
