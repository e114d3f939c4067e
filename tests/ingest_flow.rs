//! End-to-end flow: SDK client -> HTTP ingest -> SQLite.

use std::time::Duration;

use serde_json::json;
use tempfile::tempdir;

use xray::config::{SdkConfig, ServerConfig};
use xray::models::{DetailLevel, Phase, RunStatus, StepStatus, StepType};
use xray::repository::{
    run_migrations, AsyncSqlitePool, PayloadRepository, RunRepository, StepRepository,
};
use xray::sdk::Client;
use xray::server::{create_router, AppState};

/// Bind an ephemeral ingest server over a fresh database.
async fn spawn_server(db_url: &str) -> (String, tokio::task::JoinHandle<()>) {
    run_migrations(db_url).await.unwrap();

    let config = ServerConfig {
        database_url: db_url.to_string(),
        debug: false,
    };
    let app = create_router(AppState::new(&config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), handle)
}

fn sdk_config(base_url: &str) -> SdkConfig {
    SdkConfig {
        base_url: Some(base_url.to_string()),
        flush_interval: 0.2,
        ..SdkConfig::default()
    }
}

#[tokio::test]
async fn test_pipeline_events_reach_the_database() {
    let dir = tempdir().unwrap();
    let db_url = dir.path().join("xray.db").display().to_string();
    let (base_url, server) = spawn_server(&db_url).await;

    let client = Client::new(sdk_config(&base_url));
    client.start().await;

    let run = client.start_run("product-categorization", &json!({"query": "laptop"}));
    let mut step = run.start_step(
        "filter_in_stock",
        StepType::Filter,
        &json!([{"id": "1", "score": 0.9}, {"id": "2", "score": 0.4}]),
        None,
    );
    step.attach_reasoning(json!("kept items in stock"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    step.end(&json!([{"id": "1", "score": 0.9}]));
    run.end(&json!({"kept": 1}));

    client.shutdown(Duration::from_secs(5)).await;
    server.abort();

    let pool = AsyncSqlitePool::new(&db_url);
    let runs = RunRepository::new(pool.clone());
    let steps = StepRepository::new(pool);

    let run_id = run.id().to_string();
    let stored_run = runs.get(&run_id).await.unwrap().unwrap();
    assert_eq!(stored_run.pipeline_name, "product-categorization");
    assert_eq!(stored_run.status, RunStatus::Success);
    assert!(stored_run.ended_at.unwrap() >= stored_run.started_at);

    let stored_steps = steps.for_run(&run_id).await.unwrap();
    assert_eq!(stored_steps.len(), 1);
    let stored = &stored_steps[0];
    assert_eq!(stored.id, step.id().to_string());
    assert_eq!(stored.status, StepStatus::Success);
    assert_eq!(stored.index, 0);
    assert_eq!(stored.input_count, Some(2));
    assert_eq!(stored.output_count, Some(1));
    assert_eq!(
        stored.reasoning,
        Some(json!({"explanation": "kept items in stock"}))
    );

    // Candidate ids survive summarization on the way through.
    let input_summary = stored.input_summary.as_ref().unwrap();
    assert_eq!(input_summary["_type"], "candidates");
    assert_eq!(input_summary["_count"], 2);
    assert_eq!(input_summary["_candidates"][1]["id"], "2");

    // Monotonic duration roughly matches the wall-clock delta.
    let duration = stored.duration_ms.unwrap();
    assert!((30..=5_000).contains(&duration), "duration {duration}ms");
}

#[tokio::test]
async fn test_failed_step_reports_error_status() {
    let dir = tempdir().unwrap();
    let db_url = dir.path().join("xray.db").display().to_string();
    let (base_url, server) = spawn_server(&db_url).await;

    let client = Client::new(sdk_config(&base_url));
    client.start().await;

    let run = client.start_run("product-categorization", &json!({"query": "laptop"}));
    let mut step = run.start_step("rank", StepType::Rank, &json!([1, 2, 3]), None);
    let failure = std::io::Error::new(std::io::ErrorKind::TimedOut, "ranking service timed out");
    step.end_with_error(&failure);
    run.end_with_error(&failure);

    client.shutdown(Duration::from_secs(5)).await;
    server.abort();

    let pool = AsyncSqlitePool::new(&db_url);
    let stored_run = RunRepository::new(pool.clone())
        .get(&run.id().to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored_run.status, RunStatus::Error);
    assert_eq!(
        stored_run.error_message.as_deref(),
        Some("Error: ranking service timed out")
    );

    let stored_steps = StepRepository::new(pool)
        .for_run(&run.id().to_string())
        .await
        .unwrap();
    assert_eq!(stored_steps[0].status, StepStatus::Error);
}

#[tokio::test]
async fn test_full_detail_externalizes_payloads() {
    let dir = tempdir().unwrap();
    let db_url = dir.path().join("xray.db").display().to_string();
    let (base_url, server) = spawn_server(&db_url).await;

    let mut config = sdk_config(&base_url);
    config.default_detail = DetailLevel::Full;
    let client = Client::new(config);
    client.start().await;

    let run = client.start_run("pipeline", &json!({"rows": [1, 2, 3]}));
    let mut step = run.start_step("transform", StepType::Transform, &json!([1, 2, 3]), None);
    step.end(&json!([2, 4, 6]));
    run.end(&json!({"rows": [2, 4, 6]}));

    client.shutdown(Duration::from_secs(5)).await;
    server.abort();

    let pool = AsyncSqlitePool::new(&db_url);
    let payloads = PayloadRepository::new(pool)
        .for_run(&run.id().to_string())
        .await
        .unwrap();

    // Run input/output plus step input/output.
    assert_eq!(payloads.len(), 4);
    let step_outputs: Vec<_> = payloads
        .iter()
        .filter(|p| p.step_id.is_some() && p.phase == Phase::Output)
        .collect();
    assert_eq!(step_outputs.len(), 1);
    assert_eq!(step_outputs[0].body, json!([2, 4, 6]));
    assert_eq!(step_outputs[0].ref_id, "output");
}

#[tokio::test]
async fn test_events_ship_in_send_order() {
    let dir = tempdir().unwrap();
    let db_url = dir.path().join("xray.db").display().to_string();
    let (base_url, server) = spawn_server(&db_url).await;

    let client = Client::new(sdk_config(&base_url));
    client.start().await;

    // Many steps from one task: enqueue order must survive batching.
    let run = client.start_run("pipeline", &());
    for i in 0..20 {
        let mut step = run.start_step(&format!("step-{i}"), StepType::Other, &json!(i), None);
        step.end(&json!(i));
    }
    run.end(&());

    client.shutdown(Duration::from_secs(5)).await;
    server.abort();

    let pool = AsyncSqlitePool::new(&db_url);
    let stored_steps = StepRepository::new(pool)
        .for_run(&run.id().to_string())
        .await
        .unwrap();

    // All step_start events arrived after their run_start, in index order,
    // and every step_end found its step_start already persisted.
    assert_eq!(stored_steps.len(), 20);
    for (i, step) in stored_steps.iter().enumerate() {
        assert_eq!(step.index, i as i32);
        assert_eq!(step.status, StepStatus::Success);
        assert!(step.ended_at.is_some());
    }
}
