/// HTTP API layer
///
/// REST endpoints for deploying and triggering workflows, hot-reloading
/// configs, managing repeating schedules, and the per-job WebSocket event
/// channel.

pub mod events;
pub mod schedules;
pub mod workflows;

use crate::events::EventBridge;
use crate::queue::{JobStore, RepeatingScheduler};
use crate::workflow::ConfigRegistry;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;

/// Shared state for all API routes
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConfigRegistry>,
    pub queue: JobStore,
    pub scheduler: Arc<RepeatingScheduler>,
    pub events: Arc<EventBridge>,
}

/// All application routes
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/trigger-workflow", post(workflows::trigger_workflow))
        .route("/deploy", post(workflows::deploy_graph))
        .route("/hot-reload", put(workflows::hot_reload))
        .route("/schedules", get(schedules::list_schedules))
        .route("/schedules/{key}", delete(schedules::remove_schedule))
        .route("/events/{job_id}", get(events::job_events))
}
