/// Hot-swap config registry using ArcSwap
///
/// Lock-free atomic updates to the in-memory config map: each change swaps
/// the whole map pointer, so workers reading configs at execution time are
/// never blocked and always see a consistent snapshot. A config edit
/// therefore affects the *next* firing of a workflow, never one in flight.

use crate::error::QueueError;
use crate::workflow::storage::ConfigStore;
use crate::workflow::types::WorkflowConfig;
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

#[derive(Debug)]
pub struct ConfigRegistry {
    configs: ArcSwap<HashMap<String, WorkflowConfig>>,
    storage: ConfigStore,
}

impl ConfigRegistry {
    pub fn new(storage: ConfigStore) -> Self {
        Self {
            configs: ArcSwap::new(Arc::new(HashMap::new())),
            storage,
        }
    }

    /// Populate the registry from persistent storage at startup
    pub async fn init_from_storage(&self) -> Result<(), QueueError> {
        let stored = self.storage.load_all().await?;
        let count = stored.len();
        self.configs.store(Arc::new(stored));
        tracing::info!(count, "initialized workflow config registry");
        Ok(())
    }

    /// Persist a config and swap it into the live map
    pub async fn upsert(&self, config: WorkflowConfig) -> Result<(), QueueError> {
        self.storage.save(&config).await?;

        let current = self.configs.load();
        let mut next = (**current).clone();
        next.insert(config.id.clone(), config);
        self.configs.store(Arc::new(next));
        Ok(())
    }

    /// Lock-free read used by workers when a job fires
    pub fn get(&self, workflow_id: &str) -> Option<WorkflowConfig> {
        self.configs.load().get(workflow_id).cloned()
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.configs.load().keys().cloned().collect()
    }

    pub async fn remove(&self, workflow_id: &str) -> Result<bool, QueueError> {
        let deleted = self.storage.delete(workflow_id).await?;

        let current = self.configs.load();
        let mut next = (**current).clone();
        if next.remove(workflow_id).is_some() {
            self.configs.store(Arc::new(next));
            tracing::info!(%workflow_id, "removed workflow config");
        }
        Ok(deleted)
    }
}
