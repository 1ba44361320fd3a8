/// Queue consumer: claims due jobs and runs their action trees
///
/// One worker process with a fixed number of concurrent slots. Per job:
/// load the workflow config from the hot-swap registry (so edits apply to
/// the next firing), expand the trigger into work items (a sheet trigger
/// yields one item per matching row), run the chain executor per item,
/// and publish lifecycle events. Failures go back through the queue's
/// retry/backoff discipline.

use crate::engine::ChainExecutor;
use crate::events::{EventBridge, JobEmitter};
use crate::queue::store::{Job, JobStore};
use crate::sheets::{column_letter, SheetService};
use crate::workflow::registry::ConfigRegistry;
use crate::workflow::types::{ExecutionContext, TriggerSpec, WorkflowConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const DEFAULT_SHEET_TRIGGER_COL: u32 = 5;
const DEFAULT_SHEET_TRIGGER_VALUE: &str = "Pending";
/// Data rows start below the header row
const SHEET_FIRST_DATA_ROW: i64 = 2;

/// One unit of execution within a job
struct WorkItem {
    context: ExecutionContext,
    /// Originating sheet row, for error-marker write-back
    row_index: Option<i64>,
}

pub struct Worker {
    store: JobStore,
    registry: Arc<ConfigRegistry>,
    executor: Arc<ChainExecutor>,
    events: Arc<EventBridge>,
    sheets: Arc<dyn SheetService>,
    slots: Arc<Semaphore>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        store: JobStore,
        registry: Arc<ConfigRegistry>,
        executor: Arc<ChainExecutor>,
        events: Arc<EventBridge>,
        sheets: Arc<dyn SheetService>,
        slots: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            executor,
            events,
            sheets,
            slots: Arc::new(Semaphore::new(slots)),
            poll_interval,
        }
    }

    /// Poll loop: claim a due job per free slot, process it on its own task
    pub async fn run(self: Arc<Self>) {
        tracing::info!(
            slots = self.slots.available_permits(),
            "worker started"
        );

        loop {
            let Ok(permit) = Arc::clone(&self.slots).acquire_owned().await else {
                break;
            };

            match self.store.claim_due().await {
                Ok(Some(job)) => {
                    let worker = Arc::clone(&self);
                    tokio::spawn(async move {
                        worker.process(job).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to claim job");
                    drop(permit);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Process one claimed job end to end
    pub async fn process(&self, job: Job) {
        tracing::info!(job_id = %job.id, workflow_id = %job.workflow_id, attempt = job.attempts, "processing job");
        let emitter = JobEmitter::new(Arc::clone(&self.events), job.id.clone());
        emitter.started();

        let Some(config) = self.registry.get(&job.workflow_id) else {
            self.handle_failure(&job, &emitter, "no workflow config stored for this id").await;
            return;
        };

        let items = match self.expand_work_items(&config, &job).await {
            Ok(items) => items,
            Err(reason) => {
                self.handle_failure(&job, &emitter, &reason).await;
                return;
            }
        };

        let processed = items.len();
        let mut failed_branches = Vec::new();

        for item in items {
            let outcome = Arc::clone(&self.executor)
                .execute(config.actions.clone(), item.context, emitter.clone())
                .await;

            match outcome {
                Ok(run) => failed_branches.extend(run.failed_branches),
                Err(step_error) => {
                    let message = step_error.to_string();
                    self.write_error_marker(&config, item.row_index, &message).await;
                    self.handle_failure(&job, &emitter, &message).await;
                    return;
                }
            }
        }

        // Partial-success policy: a lost parallel branch does not fail the
        // job, but the aggregate result says so explicitly.
        let result = json!({
            "status": "success",
            "processed": processed,
            "partial": !failed_branches.is_empty(),
            "failedBranches": failed_branches,
        });

        if let Err(e) = self.store.complete(&job.id, &result).await {
            tracing::error!(job_id = %job.id, error = %e, "failed to record completion");
        }
        emitter.completed(result);
        tracing::info!(job_id = %job.id, processed, "job completed");
    }

    /// Expand a job into per-run work items based on its trigger
    ///
    /// Webhook and timer triggers run once with the queued context. A
    /// sheet trigger reads the sheet and yields one item per row whose
    /// trigger column carries the marker value, seeding `Column_<letter>`
    /// variables, mapped column names, `ROW_INDEX` and `SPREADSHEET_ID`.
    async fn expand_work_items(
        &self,
        config: &WorkflowConfig,
        job: &Job,
    ) -> Result<Vec<WorkItem>, String> {
        let TriggerSpec::Sheets { col_index, value } = &config.trigger else {
            let context = ExecutionContext::from_value(job.context.clone());
            return Ok(vec![WorkItem { context, row_index: None }]);
        };

        let spreadsheet_id = config
            .settings
            .spreadsheet_id
            .as_deref()
            .ok_or_else(|| "sheet trigger without a spreadsheet id".to_string())?;

        let rows = self
            .sheets
            .read_rows(spreadsheet_id)
            .await
            .map_err(|e| format!("failed to read sheet: {}", e))?;

        let trigger_col = col_index.unwrap_or(DEFAULT_SHEET_TRIGGER_COL) as usize;
        let trigger_value = value.as_deref().unwrap_or(DEFAULT_SHEET_TRIGGER_VALUE);

        let mut items = Vec::new();
        for (offset, row) in rows.iter().enumerate() {
            if row.get(trigger_col).map(String::as_str) != Some(trigger_value) {
                continue;
            }

            let row_index = offset as i64 + SHEET_FIRST_DATA_ROW;
            let mut context = ExecutionContext::from_value(job.context.clone());
            for (col, cell) in row.iter().enumerate() {
                if let Some(letter) = column_letter(col as u32) {
                    context.insert(format!("Column_{}", letter), json!(cell));
                }
                if let Some(name) = config.settings.column_mapping.get(&col.to_string()) {
                    context.insert(name.clone(), json!(cell));
                }
            }
            context.insert("ROW_INDEX", json!(row_index));
            context.insert("SPREADSHEET_ID", json!(spreadsheet_id));
            items.push(WorkItem { context, row_index: Some(row_index) });
        }

        tracing::info!(
            matching = items.len(),
            total = rows.len(),
            "sheet trigger expanded into work items"
        );
        Ok(items)
    }

    /// Best-effort error marker on the originating row; its own failure is
    /// swallowed.
    async fn write_error_marker(
        &self,
        config: &WorkflowConfig,
        row_index: Option<i64>,
        message: &str,
    ) {
        let (Some(row), TriggerSpec::Sheets { col_index, .. }) = (row_index, &config.trigger)
        else {
            return;
        };
        let Some(spreadsheet_id) = config.settings.spreadsheet_id.as_deref() else {
            return;
        };
        let Some(col) = column_letter(col_index.unwrap_or(DEFAULT_SHEET_TRIGGER_COL)) else {
            return;
        };

        let cell = format!("Sheet1!{}{}", col, row);
        let marker = format!("Error: {}", message);
        if let Err(e) = self.sheets.update_cell(spreadsheet_id, &cell, &marker).await {
            tracing::warn!(%cell, error = %e, "error-marker write-back failed");
        }
    }

    async fn handle_failure(&self, job: &Job, emitter: &JobEmitter, message: &str) {
        match self.store.fail(job, message).await {
            Ok(permanent) => {
                emitter.failed(if permanent { "failed" } else { "retrying" }, message);
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "failed to record job failure");
                emitter.failed("failed", message);
            }
        }
    }
}
