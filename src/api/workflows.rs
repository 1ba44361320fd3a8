use crate::api::AppState;
use crate::engine;
use crate::queue::EnqueueOptions;
use crate::workflow::{ActionNode, FlowGraph, GlobalSettings, TriggerSpec, WorkflowConfig};
use axum::extract::{Json, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

type ApiResult = Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)>;

/// Pre-compiled workflow payload as submitted by a producer
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedConfig {
    pub workflow_name: String,
    pub trigger: TriggerSpec,
    #[serde(default)]
    pub settings: GlobalSettings,
    pub actions: Vec<ActionNode>,
}

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub config: SubmittedConfig,
    #[serde(default)]
    pub context: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub workflow_name: String,
    pub graph: FlowGraph,
    #[serde(default)]
    pub settings: GlobalSettings,
    #[serde(default)]
    pub context: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotReloadRequest {
    pub workflow_id: String,
    pub config: SubmittedConfig,
}

/// POST /trigger-workflow
///
/// Accepts an already-compiled action list, persists it under a derived
/// workflow id, and either registers the repeating schedule (timer
/// triggers) or enqueues a one-shot job.
pub async fn trigger_workflow(
    State(state): State<AppState>,
    Json(request): Json<TriggerRequest>,
) -> ApiResult {
    let config = config_from_submission(request.config, None);
    activate(&state, config, request.context).await
}

/// POST /deploy
///
/// Compiles a raw flow graph server-side before activating it. A graph
/// the compiler rejects is reported as 422 with the validation message.
pub async fn deploy_graph(
    State(state): State<AppState>,
    Json(request): Json<DeployRequest>,
) -> ApiResult {
    let compiled = engine::compile(&request.graph).map_err(|e| {
        tracing::warn!(workflow_name = %request.workflow_name, error = %e, "graph rejected");
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    let config = config_from_submission(
        SubmittedConfig {
            workflow_name: request.workflow_name,
            trigger: compiled.trigger,
            settings: request.settings,
            actions: compiled.actions,
        },
        None,
    );
    activate(&state, config, request.context).await
}

/// PUT /hot-reload
///
/// Replaces a stored config in place. Queued jobs and schedule firings
/// pick up the new version the next time they execute.
pub async fn hot_reload(
    State(state): State<AppState>,
    Json(request): Json<HotReloadRequest>,
) -> ApiResult {
    let workflow_id = request.workflow_id.clone();
    let config = config_from_submission(request.config, Some(request.workflow_id));

    state
        .registry
        .upsert(config)
        .await
        .map_err(internal_error)?;

    tracing::info!(%workflow_id, "config hot-reloaded");
    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "workflowId": workflow_id,
        })),
    ))
}

fn config_from_submission(submitted: SubmittedConfig, id: Option<String>) -> WorkflowConfig {
    let id =
        id.unwrap_or_else(|| WorkflowConfig::derive_id(&submitted.workflow_name, &submitted.trigger));
    WorkflowConfig {
        id,
        workflow_name: submitted.workflow_name,
        trigger: submitted.trigger,
        settings: submitted.settings,
        actions: submitted.actions,
    }
}

/// Persist the config, then hand it to the scheduler or the queue
/// depending on its trigger.
async fn activate(state: &AppState, config: WorkflowConfig, context: Value) -> ApiResult {
    let workflow_id = config.id.clone();
    let trigger = config.trigger.clone();

    state
        .registry
        .upsert(config)
        .await
        .map_err(internal_error)?;

    match trigger {
        TriggerSpec::Timer { schedule } => {
            state
                .scheduler
                .deploy(&workflow_id, schedule, context)
                .await
                .map_err(internal_error)?;

            Ok((
                StatusCode::ACCEPTED,
                Json(json!({
                    "success": true,
                    "message": "Workflow scheduled successfully!",
                    "jobId": workflow_id,
                })),
            ))
        }
        _ => {
            let job_id = state
                .queue
                .enqueue(
                    &workflow_id,
                    context,
                    EnqueueOptions {
                        job_id: Some(workflow_id.clone()),
                        ..Default::default()
                    },
                )
                .await
                .map_err(internal_error)?;

            Ok((
                StatusCode::ACCEPTED,
                Json(json!({
                    "success": true,
                    "message": "Workflow queued successfully!",
                    "jobId": job_id,
                })),
            ))
        }
    }
}

fn internal_error<E: std::fmt::Display>(error: E) -> (StatusCode, Json<Value>) {
    tracing::error!(%error, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": error.to_string() })),
    )
}
