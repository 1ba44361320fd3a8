use crate::api::AppState;
use crate::error::ScheduleError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

/// GET /schedules
pub async fn list_schedules(State(state): State<AppState>) -> Json<Value> {
    let jobs = state.scheduler.list().await;
    Json(json!({
        "success": true,
        "jobs": jobs,
    }))
}

/// DELETE /schedules/{key}
pub async fn remove_schedule(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.scheduler.remove(&key).await {
        Ok(()) => Ok(Json(json!({
            "success": true,
            "message": format!("Schedule '{}' removed", key),
        }))),
        Err(ScheduleError::UnknownKey(key)) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no schedule with key '{}'", key) })),
        )),
        Err(e) => {
            tracing::error!(%key, error = %e, "failed to remove schedule");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    }
}
