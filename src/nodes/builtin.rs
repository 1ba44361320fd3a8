/// Builtin node handlers
///
/// The small set of actions the engine ships with; everything else is
/// registered by the embedding application through `NodeRegistry::register`.

use crate::error::NodeError;
use crate::nodes::NodeHandler;
use crate::sheets::{column_letter, SheetService};
use crate::workflow::types::ExecutionContext;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Current timestamp in several formats
pub struct CurrentTime;

#[async_trait]
impl NodeHandler for CurrentTime {
    async fn run(
        &self,
        _inputs: Map<String, Value>,
        _context: &ExecutionContext,
    ) -> Result<Map<String, Value>, NodeError> {
        let now = chrono::Utc::now();
        let mut result = Map::new();
        result.insert("ISO".into(), json!(now.to_rfc3339()));
        result.insert("UNIX".into(), json!(now.timestamp()));
        result.insert("UNIX_MS".into(), json!(now.timestamp_millis()));
        result.insert("READABLE".into(), json!(now.format("%Y-%m-%d %H:%M:%S UTC").to_string()));
        result.insert("STATUS".into(), json!("Success"));
        Ok(result)
    }
}

/// Generic HTTP call with optional JSON body and headers
pub struct HttpRequest {
    client: reqwest::Client,
}

impl HttpRequest {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for HttpRequest {
    async fn run(
        &self,
        inputs: Map<String, Value>,
        _context: &ExecutionContext,
    ) -> Result<Map<String, Value>, NodeError> {
        let url = inputs
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| NodeError::MissingInput("url".into()))?;
        let method = inputs.get("method").and_then(|v| v.as_str()).unwrap_or("GET");

        let mut request = match method.to_uppercase().as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "DELETE" => self.client.delete(url),
            "PATCH" => self.client.patch(url),
            other => {
                return Err(NodeError::InvalidInput {
                    input: "method".into(),
                    reason: format!("unsupported HTTP method: {}", other),
                })
            }
        };

        if let Some(headers) = inputs.get("headers").and_then(|v| v.as_object()) {
            for (key, value) in headers {
                if let Some(text) = value.as_str() {
                    request = request.header(key, text);
                }
            }
        }

        if let Some(body) = inputs.get("body") {
            request = request.header("Content-Type", "application/json").json(body);
        }

        tracing::debug!(%url, method, "sending HTTP request");
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        // Prefer structured JSON responses, fall back to raw text.
        let data = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        let mut result = Map::new();
        result.insert("HTTP_STATUS".into(), json!(status.as_u16()));
        result.insert("RESPONSE".into(), data);
        result.insert(
            "STATUS".into(),
            json!(if status.is_success() { "Success" } else { "Failed" }),
        );
        Ok(result)
    }
}

/// Synchronization barrier pass-through after a parallel region
///
/// Emits a marker so downstream templates can confirm the branches
/// converged; the merged data itself is already in the context.
pub struct Merge;

#[async_trait]
impl NodeHandler for Merge {
    async fn run(
        &self,
        _inputs: Map<String, Value>,
        context: &ExecutionContext,
    ) -> Result<Map<String, Value>, NodeError> {
        let variables = context.0.len();
        tracing::debug!(variables, "merge barrier reached");

        let mut result = Map::new();
        result.insert("STATUS".into(), json!("Merged"));
        result.insert("TIMESTAMP".into(), json!(chrono::Utc::now().timestamp_millis()));
        Ok(result)
    }
}

/// Write a resolved value back into the originating sheet row
///
/// The row index comes from the sheet-trigger seeding (`ROW_INDEX`); the
/// spreadsheet id from the step inputs or the seeded `SPREADSHEET_ID`.
pub struct UpdateRow {
    sheets: Arc<dyn SheetService>,
}

impl UpdateRow {
    pub fn new(sheets: Arc<dyn SheetService>) -> Self {
        Self { sheets }
    }
}

#[async_trait]
impl NodeHandler for UpdateRow {
    async fn run(
        &self,
        inputs: Map<String, Value>,
        context: &ExecutionContext,
    ) -> Result<Map<String, Value>, NodeError> {
        let value = inputs.get("value").cloned().unwrap_or(Value::Null);
        if value.is_null() {
            tracing::warn!("update_row has no value to write, skipping");
            let mut result = Map::new();
            result.insert("STATUS".into(), json!("Failed"));
            return Ok(result);
        }

        let spreadsheet_id = inputs
            .get("spreadsheetId")
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| {
                context.get("SPREADSHEET_ID").and_then(|v| v.as_str()).map(String::from)
            })
            .ok_or_else(|| NodeError::MissingInput("spreadsheetId".into()))?;

        let col_index = inputs
            .get("colIndex")
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .ok_or_else(|| NodeError::MissingInput("colIndex".into()))?;
        let col = column_letter(col_index as u32).ok_or_else(|| NodeError::InvalidInput {
            input: "colIndex".into(),
            reason: "only columns A-Z are supported".into(),
        })?;

        let row_index = context
            .get("ROW_INDEX")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| NodeError::MissingInput("ROW_INDEX".into()))?;

        let cell = format!("Sheet1!{}{}", col, row_index);
        let text = crate::engine::resolver::display(&value);
        self.sheets.update_cell(&spreadsheet_id, &cell, &text).await?;

        tracing::info!(%cell, "updated sheet cell");
        let mut result = Map::new();
        result.insert("STATUS".into(), json!("Success"));
        result.insert("UPDATED_CELL".into(), json!(cell));
        Ok(result)
    }
}
