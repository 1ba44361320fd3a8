/// Node capability contract and type registry
///
/// Every concrete action type (HTTP, on-chain, spreadsheet, messaging, ...)
/// is invoked through the same signature: resolved inputs plus the current
/// context in, a result map out. The registry is the explicit
/// type -> implementation table, built once at startup; there is no
/// runtime reflection.

pub mod builtin;

use crate::error::NodeError;
use crate::workflow::types::ExecutionContext;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Capability contract every action type must satisfy
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Execute with fully resolved inputs; the returned map is merged into
    /// the context flatly and under the step's id.
    async fn run(
        &self,
        inputs: Map<String, Value>,
        context: &ExecutionContext,
    ) -> Result<Map<String, Value>, NodeError>;
}

/// Action type -> handler table, resolved once at startup
pub struct NodeRegistry {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Registry preloaded with the builtin node set
    pub fn with_builtins(sheets: Arc<dyn crate::sheets::SheetService>) -> Self {
        let mut registry = Self::new();
        registry.register("current_time", Arc::new(builtin::CurrentTime));
        registry.register("http_request", Arc::new(builtin::HttpRequest::new()));
        registry.register("merge", Arc::new(builtin::Merge));
        registry.register("update_row", Arc::new(builtin::UpdateRow::new(sheets)));
        registry
    }

    pub fn register(&mut self, action: impl Into<String>, handler: Arc<dyn NodeHandler>) {
        let action = action.into();
        tracing::debug!(%action, "registered node handler");
        self.handlers.insert(action, handler);
    }

    pub fn get(&self, action: &str) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.get(action).cloned()
    }

    pub fn registered_types(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
