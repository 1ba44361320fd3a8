/// SQLite persistence for workflow configurations
///
/// Configs are stored as JSON under their workflow id, separately from any
/// queue entry, so a hot reload overwrites the config in place without
/// touching queue or schedule state.

use crate::error::QueueError;
use crate::workflow::types::WorkflowConfig;
use sqlx::{sqlite::SqlitePool, Row};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    pool: SqlitePool,
}

impl ConfigStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the config table; safe to call repeatedly
    pub async fn init_schema(&self) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_configs (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                config JSON NOT NULL,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or overwrite a config (the hot-reload path)
    pub async fn save(&self, config: &WorkflowConfig) -> Result<(), QueueError> {
        let config_json = serde_json::to_string(config)?;

        sqlx::query(
            r#"
            INSERT INTO workflow_configs (id, name, config, updated_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                config = excluded.config,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&config.id)
        .bind(&config.workflow_name)
        .bind(&config_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<WorkflowConfig>, QueueError> {
        let row = sqlx::query("SELECT config FROM workflow_configs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let config_json: String = row.get("config");
                Ok(Some(serde_json::from_str(&config_json)?))
            }
            None => Ok(None),
        }
    }

    /// Load everything for registry initialization and schedule recovery
    pub async fn load_all(&self) -> Result<HashMap<String, WorkflowConfig>, QueueError> {
        let rows = sqlx::query("SELECT id, config FROM workflow_configs")
            .fetch_all(&self.pool)
            .await?;

        let mut configs = HashMap::new();
        for row in rows {
            let id: String = row.get("id");
            let config_json: String = row.get("config");
            configs.insert(id, serde_json::from_str(&config_json)?);
        }
        Ok(configs)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, QueueError> {
        let result = sqlx::query("DELETE FROM workflow_configs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
