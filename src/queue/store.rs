/// Durable SQLite-backed job queue
///
/// At-least-once delivery: a claimed job that fails is re-queued with
/// exponential backoff until its attempt budget is spent, then marked
/// permanently failed. The payload carries only the workflow id and the
/// runtime context; the action tree lives in the config store and is
/// loaded when the job runs.

use crate::error::QueueError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

/// Attempt budget matching the original deployment defaults
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Base delay for exponential backoff
pub const BASE_BACKOFF_MS: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> JobStatus {
        match s {
            "active" => JobStatus::Active,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Queued,
        }
    }
}

/// One queued unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub workflow_id: String,
    /// Initial runtime context for the run
    pub context: Value,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub run_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Options for `enqueue`
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    /// Stable external id; defaults to a fresh `job_<uuid>`
    pub job_id: Option<String>,
    pub delay: Option<Duration>,
    pub max_attempts: u32,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self { job_id: None, delay: None, max_attempts: DEFAULT_MAX_ATTEMPTS }
    }
}

/// Exponential backoff delay before the given retry attempt
pub fn backoff_delay(attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(16);
    Duration::milliseconds(BASE_BACKOFF_MS << exponent)
}

#[derive(Debug, Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the jobs table; safe to call repeatedly
    pub async fn init_schema(&self) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                context JSON NOT NULL,
                status TEXT NOT NULL DEFAULT 'queued',
                attempts INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL DEFAULT 3,
                run_at INTEGER NOT NULL,
                last_error TEXT,
                result JSON,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_jobs_due
            ON jobs(status, run_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Re-queue jobs left in `active` by a previous process
    ///
    /// With a single worker process, nothing can legitimately be active at
    /// startup; anything still marked active belonged to a run that died
    /// mid-job and gets delivered again.
    pub async fn recover_stalled(&self) -> Result<u64, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'queued', updated_at = CURRENT_TIMESTAMP
            WHERE status = 'active'
            "#,
        )
        .execute(&self.pool)
        .await?;

        let recovered = result.rows_affected();
        if recovered > 0 {
            tracing::warn!(recovered, "re-queued jobs stranded by a previous run");
        }
        Ok(recovered)
    }

    /// Add a job; a duplicate id is a no-op (the queue's dedupe contract
    /// for immediate jobs re-submitted under their stable id).
    pub async fn enqueue(
        &self,
        workflow_id: &str,
        context: Value,
        options: EnqueueOptions,
    ) -> Result<String, QueueError> {
        let job_id = options
            .job_id
            .unwrap_or_else(|| format!("job_{}", Uuid::new_v4()));
        let run_at = Utc::now() + options.delay.unwrap_or_else(Duration::zero);
        let context_json = serde_json::to_string(&context)?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, workflow_id, context, status, attempts, max_attempts, run_at)
            VALUES (?, ?, ?, 'queued', 0, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&job_id)
        .bind(workflow_id)
        .bind(&context_json)
        .bind(options.max_attempts as i64)
        .bind(run_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        tracing::info!(%job_id, %workflow_id, "enqueued job");
        Ok(job_id)
    }

    /// Claim the next due job, marking it active and charging an attempt
    ///
    /// Single-worker-process discipline: the UPDATE re-checks the status so
    /// concurrent claims inside the process cannot double-deliver.
    pub async fn claim_due(&self) -> Result<Option<Job>, QueueError> {
        let now = Utc::now().timestamp_millis();

        let row = sqlx::query(
            r#"
            SELECT id FROM jobs
            WHERE status = 'queued' AND run_at <= ?
            ORDER BY run_at ASC
            LIMIT 1
            "#,
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let id: String = row.get("id");

        let claimed = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'active', attempts = attempts + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND status = 'queued'
            "#,
        )
        .bind(&id)
        .execute(&self.pool)
        .await?;

        if claimed.rows_affected() == 0 {
            // Lost the race to another slot; the caller just polls again.
            return Ok(None);
        }

        self.get(&id).await.map(Some)
    }

    pub async fn get(&self, id: &str) -> Result<Job, QueueError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        let context_json: String = row.get("context");
        let status: String = row.get("status");
        let run_at_ms: i64 = row.get("run_at");

        Ok(Job {
            id: row.get("id"),
            workflow_id: row.get("workflow_id"),
            context: serde_json::from_str(&context_json)?,
            status: JobStatus::parse(&status),
            attempts: row.get::<i64, _>("attempts") as u32,
            max_attempts: row.get::<i64, _>("max_attempts") as u32,
            run_at: DateTime::from_timestamp_millis(run_at_ms).unwrap_or_else(Utc::now),
            last_error: row.get("last_error"),
        })
    }

    pub async fn complete(&self, id: &str, result: &Value) -> Result<(), QueueError> {
        let result_json = serde_json::to_string(result)?;
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', result = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(&result_json)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a failed attempt
    ///
    /// Re-queues with exponential backoff while attempts remain; otherwise
    /// marks the job permanently failed. Returns true when the failure is
    /// permanent.
    pub async fn fail(&self, job: &Job, error: &str) -> Result<bool, QueueError> {
        let exhausted = job.attempts >= job.max_attempts;

        if exhausted {
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'failed', last_error = ?, updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                "#,
            )
            .bind(error)
            .bind(&job.id)
            .execute(&self.pool)
            .await?;
            tracing::error!(job_id = %job.id, attempts = job.attempts, "job permanently failed");
        } else {
            let next_run = Utc::now() + backoff_delay(job.attempts);
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'queued', last_error = ?, run_at = ?,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                "#,
            )
            .bind(error)
            .bind(next_run.timestamp_millis())
            .bind(&job.id)
            .execute(&self.pool)
            .await?;
            tracing::warn!(
                job_id = %job.id,
                attempt = job.attempts,
                next_run = %next_run,
                "job failed, re-queued with backoff"
            );
        }

        Ok(exhausted)
    }

    /// Number of jobs in a given status (used by tests and diagnostics)
    pub async fn count_with_status(&self, status: JobStatus) -> Result<i64, QueueError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}
