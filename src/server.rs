/// Server setup and initialization
///
/// Wires together all components: storage, registry, queue, scheduler,
/// worker pool, event bridge, and HTTP routes. Provides the main
/// application factory function for creating the Axum app.

use crate::{
    api::{self, AppState},
    config::Config,
    engine::ChainExecutor,
    events::EventBridge,
    nodes::NodeRegistry,
    queue::{JobStore, RepeatingScheduler, Worker},
    sheets::{NullSheets, SheetService},
    workflow::{ConfigRegistry, ConfigStore, TriggerSpec},
};
use anyhow::Result;
use axum::{routing::get, Router};
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Create the main Axum application with all routes and background tasks
///
/// Initializes the database, loads persisted workflow configs, re-registers
/// surviving timer schedules, and spawns the queue worker.
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("🗄️ Connecting to database: {}", config.database.url);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database.url)
        .await?;

    let config_store = ConfigStore::new(pool.clone());
    config_store.init_schema().await?;

    let job_store = JobStore::new(pool);
    job_store.init_schema().await?;
    job_store.recover_stalled().await?;

    tracing::info!("📥 Loading workflow configs from storage");
    let registry = Arc::new(ConfigRegistry::new(config_store.clone()));
    registry.init_from_storage().await?;

    let events = Arc::new(EventBridge::new());
    let sheets: Arc<dyn SheetService> = Arc::new(NullSheets);
    let node_registry = Arc::new(NodeRegistry::with_builtins(Arc::clone(&sheets)));
    let executor = Arc::new(ChainExecutor::new(node_registry));

    tracing::info!("⏰ Initializing repeating scheduler");
    let scheduler = Arc::new(RepeatingScheduler::new(job_store.clone()).await?);

    // Timer workflows survive restarts through their stored configs; the
    // in-memory schedule entries have to be rebuilt from them.
    for id in registry.list_ids() {
        let Some(stored) = registry.get(&id) else { continue };
        if let TriggerSpec::Timer { schedule } = stored.trigger {
            tracing::info!(workflow_id = %id, "re-registering persisted schedule");
            scheduler.deploy(&id, schedule, json!({})).await?;
        }
    }
    scheduler.start().await?;

    tracing::info!("👷 Starting queue worker ({} slots)", config.worker.slots);
    let worker = Arc::new(Worker::new(
        job_store.clone(),
        Arc::clone(&registry),
        executor,
        Arc::clone(&events),
        sheets,
        config.worker.slots,
        Duration::from_millis(config.worker.poll_interval_ms),
    ));
    tokio::spawn(worker.run());

    let app_state = AppState {
        registry,
        queue: job_store,
        scheduler,
        events,
    };

    let app = Router::new()
        .route("/healthz", get(health_check))
        .merge(api::create_routes().with_state(app_state));

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Nexusflow server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
