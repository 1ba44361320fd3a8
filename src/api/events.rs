use crate::api::AppState;
use crate::events::{EventBridge, EventKind};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// GET /events/{job_id}
///
/// Upgrades to a WebSocket that streams the lifecycle events for one job.
/// The stream closes after the job's terminal event.
pub async fn job_events(
    ws: WebSocketUpgrade,
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let events = Arc::clone(&state.events);
    ws.on_upgrade(move |socket| forward_events(socket, job_id, events))
}

async fn forward_events(mut socket: WebSocket, job_id: String, events: Arc<EventBridge>) {
    let mut rx = events.subscribe();
    tracing::debug!(%job_id, "event stream attached");

    loop {
        match rx.recv().await {
            Ok(event) if event.job_id == job_id => {
                let terminal =
                    matches!(event.kind, EventKind::Completed | EventKind::Failed)
                        && event.status != "retrying";

                let payload = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(%job_id, error = %e, "failed to encode job event");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
                if terminal {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(%job_id, skipped, "event stream lagged; events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }

    tracing::debug!(%job_id, "event stream detached");
}
