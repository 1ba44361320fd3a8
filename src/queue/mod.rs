/// Durable job queue, worker loop, and repeating-schedule service
///
/// The queue persists jobs in SQLite with at-least-once delivery and
/// exponential backoff; the scheduler turns timer triggers into queue
/// entries; the worker consumes the queue and drives the engine.

pub mod scheduler;
pub mod store;
pub mod worker;

pub use scheduler::{RepeatingScheduler, ScheduleInfo};
pub use store::{EnqueueOptions, Job, JobStatus, JobStore};
pub use worker::Worker;
