/// Repeating-schedule service for timer triggers
///
/// Wraps tokio-cron-scheduler with a key -> entry map so redeploys are
/// idempotent: deploying a timer workflow removes any existing entry for
/// the same workflow id before adding the new spec, guaranteeing at most
/// one active repeating entry per workflow. Each tick only enqueues a job
/// referencing the workflow id; execution always goes through the durable
/// queue and reads the config live, so a hot reload applies on the next
/// firing.

use crate::error::ScheduleError;
use crate::queue::store::{EnqueueOptions, JobStore};
use crate::workflow::types::RepeatSpec;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// One active repeating entry
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    /// Opaque composite key (workflow id + repeat spec)
    pub key: String,
    pub workflow_id: String,
    pub spec: RepeatSpec,
    job_uuid: Uuid,
}

/// Listing shape for the schedules endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleInfo {
    pub key: String,
    /// The workflow id this entry fires
    pub id: String,
    pub pattern: String,
    #[serde(rename = "nextRun")]
    pub next_run: Option<DateTime<Utc>>,
}

pub struct RepeatingScheduler {
    scheduler: RwLock<JobScheduler>,
    /// Held across remove-then-add so concurrent redeploys of the same
    /// workflow id cannot interleave into duplicate or missing entries.
    entries: Mutex<HashMap<String, ScheduleEntry>>,
    store: JobStore,
}

impl RepeatingScheduler {
    pub async fn new(store: JobStore) -> Result<Self, ScheduleError> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler: RwLock::new(scheduler),
            entries: Mutex::new(HashMap::new()),
            store,
        })
    }

    /// Start ticking; entries can be added before or after
    pub async fn start(&self) -> Result<(), ScheduleError> {
        self.scheduler.read().await.start().await?;
        tracing::info!("repeating scheduler started");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), ScheduleError> {
        self.entries.lock().await.clear();
        self.scheduler.write().await.shutdown().await?;
        Ok(())
    }

    fn compose_key(workflow_id: &str, spec: &RepeatSpec) -> String {
        format!("{}::{}", workflow_id, spec.describe())
    }

    /// Register (or replace) the repeating entry for a workflow
    ///
    /// The remove-then-add sequence is a critical section per workflow id;
    /// the entry lock serializes it. The deploy-time context is replayed
    /// into every fired job.
    pub async fn deploy(
        &self,
        workflow_id: &str,
        spec: RepeatSpec,
        context: Value,
    ) -> Result<ScheduleEntry, ScheduleError> {
        let mut entries = self.entries.lock().await;

        // Drop any existing entry for this workflow id first.
        let stale: Vec<String> = entries
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .map(|e| e.key.clone())
            .collect();
        for key in stale {
            if let Some(entry) = entries.remove(&key) {
                let scheduler = self.scheduler.read().await;
                if let Err(e) = scheduler.remove(&entry.job_uuid).await {
                    tracing::warn!(%key, error = %e, "failed to remove superseded schedule");
                } else {
                    tracing::info!(%key, "replaced existing schedule on redeploy");
                }
            }
        }

        let job = self.build_job(workflow_id, &spec, context)?;
        let job_uuid = {
            let scheduler = self.scheduler.write().await;
            scheduler.add(job).await?
        };

        let entry = ScheduleEntry {
            key: Self::compose_key(workflow_id, &spec),
            workflow_id: workflow_id.to_string(),
            spec,
            job_uuid,
        };
        tracing::info!(key = %entry.key, pattern = %entry.spec.describe(), "scheduled repeating workflow");
        entries.insert(entry.key.clone(), entry.clone());
        Ok(entry)
    }

    fn build_job(
        &self,
        workflow_id: &str,
        spec: &RepeatSpec,
        context: Value,
    ) -> Result<Job, ScheduleError> {
        let store = self.store.clone();
        let workflow_id = workflow_id.to_string();

        let tick = move |_uuid: Uuid, _lock| {
            let store = store.clone();
            let workflow_id = workflow_id.clone();
            let context = context.clone();
            Box::pin(async move {
                tracing::debug!(%workflow_id, "repeating trigger fired");
                let options = EnqueueOptions {
                    // Each firing is its own queue entry under the stable
                    // workflow id prefix.
                    job_id: Some(format!("{}:{}", workflow_id, Uuid::new_v4())),
                    ..Default::default()
                };
                if let Err(e) = store.enqueue(&workflow_id, context, options).await {
                    tracing::error!(%workflow_id, error = %e, "failed to enqueue repeating job");
                }
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        };

        let job = match spec {
            RepeatSpec::Cron { pattern } => Job::new_async(pattern.as_str(), tick)?,
            RepeatSpec::Interval { minutes } => {
                Job::new_repeated_async(Duration::from_secs(minutes * 60), tick)?
            }
        };
        Ok(job)
    }

    /// Active repeating entries with their next firing time
    pub async fn list(&self) -> Vec<ScheduleInfo> {
        let entries = self.entries.lock().await;
        let mut infos = Vec::with_capacity(entries.len());
        for entry in entries.values() {
            let next_run = {
                let mut scheduler = self.scheduler.write().await;
                scheduler
                    .next_tick_for_job(entry.job_uuid)
                    .await
                    .ok()
                    .flatten()
            };
            infos.push(ScheduleInfo {
                key: entry.key.clone(),
                id: entry.workflow_id.clone(),
                pattern: entry.spec.describe(),
                next_run,
            });
        }
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    /// Remove one repeating entry by its opaque key
    pub async fn remove(&self, key: &str) -> Result<(), ScheduleError> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .remove(key)
            .ok_or_else(|| ScheduleError::UnknownKey(key.to_string()))?;

        let scheduler = self.scheduler.read().await;
        scheduler.remove(&entry.job_uuid).await?;
        tracing::info!(%key, "stopped repeating schedule");
        Ok(())
    }

    /// Remove whatever entry a workflow id currently holds (workflow
    /// deletion path)
    pub async fn remove_workflow(&self, workflow_id: &str) {
        let mut entries = self.entries.lock().await;
        let keys: Vec<String> = entries
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .map(|e| e.key.clone())
            .collect();
        for key in keys {
            if let Some(entry) = entries.remove(&key) {
                let scheduler = self.scheduler.read().await;
                if let Err(e) = scheduler.remove(&entry.job_uuid).await {
                    tracing::warn!(%key, error = %e, "failed to remove schedule for deleted workflow");
                }
            }
        }
    }

    /// Count of active entries for a workflow id (diagnostics and tests)
    pub async fn active_count(&self, workflow_id: &str) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .count()
    }
}
