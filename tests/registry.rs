//! Config persistence and hot-swap registry tests.

use nexusflow::workflow::{
    ActionNode, ConfigRegistry, ConfigStore, RepeatSpec, TriggerSpec, WorkflowConfig,
};
use serde_json::{json, Map, Value};
use sqlx::sqlite::SqlitePoolOptions;

async fn config_store() -> ConfigStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = ConfigStore::new(pool);
    store.init_schema().await.unwrap();
    store
}

fn sample_config(id: &str, url: &str) -> WorkflowConfig {
    let mut inputs = Map::new();
    inputs.insert("url".into(), Value::String(url.into()));
    WorkflowConfig {
        id: id.into(),
        workflow_name: "Sample".into(),
        trigger: TriggerSpec::Webhook,
        settings: Default::default(),
        actions: vec![ActionNode::Step {
            id: "n1".into(),
            action: "http_request".into(),
            inputs,
            gate: None,
        }],
    }
}

#[tokio::test]
async fn save_and_load_round_trips_the_config() {
    let store = config_store().await;
    store.save(&sample_config("job_1", "https://a.example")).await.unwrap();

    let loaded = store.get("job_1").await.unwrap().unwrap();
    assert_eq!(loaded.workflow_name, "Sample");
    assert_eq!(loaded.actions.len(), 1);
    assert!(store.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn save_overwrites_in_place() {
    let store = config_store().await;
    store.save(&sample_config("job_1", "https://a.example")).await.unwrap();
    store.save(&sample_config("job_1", "https://b.example")).await.unwrap();

    let loaded = store.get("job_1").await.unwrap().unwrap();
    let ActionNode::Step { inputs, .. } = &loaded.actions[0] else { panic!("expected a step") };
    assert_eq!(inputs.get("url"), Some(&json!("https://b.example")));
    assert_eq!(store.load_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn registry_initializes_from_storage() {
    let store = config_store().await;
    store.save(&sample_config("job_1", "https://a.example")).await.unwrap();
    store.save(&sample_config("job_2", "https://b.example")).await.unwrap();

    let registry = ConfigRegistry::new(store);
    registry.init_from_storage().await.unwrap();

    let mut ids = registry.list_ids();
    ids.sort();
    assert_eq!(ids, vec!["job_1", "job_2"]);
    assert!(registry.get("job_1").is_some());
}

#[tokio::test]
async fn upsert_swaps_the_live_view_and_persists() {
    let store = config_store().await;
    let registry = ConfigRegistry::new(store.clone());
    registry.init_from_storage().await.unwrap();

    registry.upsert(sample_config("job_1", "https://a.example")).await.unwrap();
    registry.upsert(sample_config("job_1", "https://b.example")).await.unwrap();

    // Readers see the replacement immediately.
    let live = registry.get("job_1").unwrap();
    let ActionNode::Step { inputs, .. } = &live.actions[0] else { panic!("expected a step") };
    assert_eq!(inputs.get("url"), Some(&json!("https://b.example")));

    // And it survived to storage.
    assert!(store.get("job_1").await.unwrap().is_some());
}

#[tokio::test]
async fn remove_deletes_from_view_and_storage() {
    let store = config_store().await;
    let registry = ConfigRegistry::new(store.clone());
    registry.upsert(sample_config("job_1", "https://a.example")).await.unwrap();

    assert!(registry.remove("job_1").await.unwrap());
    assert!(registry.get("job_1").is_none());
    assert!(store.get("job_1").await.unwrap().is_none());
    assert!(!registry.remove("job_1").await.unwrap());
}

#[test]
fn timer_workflows_get_stable_name_derived_ids() {
    let trigger = TriggerSpec::Timer { schedule: RepeatSpec::Interval { minutes: 5 } };
    assert_eq!(
        WorkflowConfig::derive_id("My Daily Report!", &trigger),
        "cron_workflow_my_daily_report_"
    );
    // Same name, same id, so redeploys land on the same schedule slot.
    assert_eq!(
        WorkflowConfig::derive_id("My Daily Report!", &trigger),
        WorkflowConfig::derive_id("My Daily Report!", &trigger),
    );
}

#[test]
fn immediate_workflows_get_unique_ids() {
    let a = WorkflowConfig::derive_id("whatever", &TriggerSpec::Webhook);
    let b = WorkflowConfig::derive_id("whatever", &TriggerSpec::Webhook);
    assert!(a.starts_with("job_"));
    // Two submissions in the same millisecond must not share an id, or
    // the second enqueue is silently dropped as a duplicate.
    assert_ne!(a, b);
}
