//! # Discovery Tests
//!
//! Covers skip logic, raw-before-queue ordering, seed failures and
//! backpressure in the discovery loop.

mod common;

use common::{fast_config, item, open_stores, setup_tracing, ScriptedDiscoverer};
use distill::ingest::{DiscoveredItem, DiscoveryDriver};
use distill::stats::PipelineStats;
use distill::store::Stage;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_new_items_are_stored_then_queued() {
    // --- 1. Arrange ---
    setup_tracing();
    let dir = tempdir().unwrap();
    let stores = open_stores(dir.path());
    let stats = Arc::new(PipelineStats::new());
    let driver = DiscoveryDriver::new(
        stores.clone(),
        stats.clone(),
        fast_config().discovery,
        CancellationToken::new(),
    );
    let discoverer = ScriptedDiscoverer::new().with_items(
        "seed",
        vec![
            DiscoveredItem::new("vid-1", "transcript one").with_metadata("Title", "First"),
            item("https://example.com/a", "page a"),
        ],
    );

    // --- 2. Act ---
    let report = driver
        .run_discovery(&discoverer, &["seed".to_string()], 1)
        .await
        .unwrap();

    // --- 3. Assert ---
    assert_eq!(report.enqueued(), 2);
    assert_eq!(report.failed_seeds, 0);
    assert!(!report.interrupted);

    let entries = stores.queue.peek_all();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].identifier, "vid-1");
    let raw = std::fs::read_to_string(&entries[0].source_content_path).unwrap();
    assert_eq!(raw, "Title: First\n\ntranscript one");
    assert_eq!(
        entries[0].source_content_path,
        stores.content.raw_path("vid-1")
    );
    assert_eq!(stats.snapshot(0).discovered, 2);
}

#[tokio::test]
async fn test_processed_and_queued_items_are_skipped() {
    // --- 1. Arrange ---
    setup_tracing();
    let dir = tempdir().unwrap();
    let stores = open_stores(dir.path());
    stores.processed.add("done").unwrap();
    let stats = Arc::new(PipelineStats::new());
    let driver = DiscoveryDriver::new(
        stores.clone(),
        stats.clone(),
        fast_config().discovery,
        CancellationToken::new(),
    );
    let discoverer = ScriptedDiscoverer::new().with_items(
        "seed",
        vec![
            item("done", "old"),
            item("new", "fresh"),
            item("new", "fresh again"),
        ],
    );

    // --- 2. Act ---
    let report = driver
        .run_discovery(&discoverer, &["seed".to_string()], 1)
        .await
        .unwrap();

    // --- 3. Assert ---
    assert_eq!(report.enqueued(), 1);
    assert_eq!(report.skipped(), 2);
    assert_eq!(stores.queue.len(), 1);
    assert!(!stores.content.raw_path("done").exists());
    // The second sighting must not overwrite the stored content.
    let raw = std::fs::read_to_string(stores.content.raw_path("new")).unwrap();
    assert!(raw.ends_with("fresh"));
    assert_eq!(stats.snapshot(0).skipped, 2);
}

#[tokio::test]
async fn test_failing_seed_is_recorded_and_next_seed_runs() {
    // --- 1. Arrange ---
    setup_tracing();
    let dir = tempdir().unwrap();
    let stores = open_stores(dir.path());
    let driver = DiscoveryDriver::new(
        stores.clone(),
        Arc::new(PipelineStats::new()),
        fast_config().discovery,
        CancellationToken::new(),
    );
    let discoverer = ScriptedDiscoverer::new()
        .with_results(
            "broken",
            vec![Ok(item("early", "kept")), Err("connection reset".to_string())],
        )
        .with_items("good", vec![item("later", "also kept")]);
    let seeds = vec!["broken".to_string(), "unknown".to_string(), "good".to_string()];

    // --- 2. Act ---
    let report = driver.run_discovery(&discoverer, &seeds, 1).await.unwrap();

    // --- 3. Assert ---
    assert_eq!(report.failed_seeds, 2);
    assert!(stores.queue.contains("early"));
    assert!(stores.queue.contains("later"));

    let records = stores.errors.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].identifier, "broken");
    assert_eq!(records[0].stage, Stage::Discover);
    assert!(records[0].message.contains("connection reset"));
    assert_eq!(records[1].identifier, "unknown");
}

#[tokio::test]
async fn test_repeated_iterations_skip_known_items() {
    setup_tracing();
    let dir = tempdir().unwrap();
    let stores = open_stores(dir.path());
    let stats = Arc::new(PipelineStats::new());
    let driver = DiscoveryDriver::new(
        stores.clone(),
        stats.clone(),
        fast_config().discovery,
        CancellationToken::new(),
    );
    let discoverer = ScriptedDiscoverer::new().with_items("seed", vec![item("a", "x")]);

    let report = driver
        .run_discovery(&discoverer, &["seed".to_string()], 3)
        .await
        .unwrap();

    assert_eq!(report.seeds.len(), 3);
    assert_eq!(report.enqueued(), 1);
    assert_eq!(report.skipped(), 2);
    assert_eq!(stats.snapshot(0).iteration, 3);
}

#[tokio::test]
async fn test_discovery_pauses_while_queue_is_full() {
    // --- 1. Arrange ---
    setup_tracing();
    let dir = tempdir().unwrap();
    let stores = open_stores(dir.path());
    let mut config = fast_config().discovery;
    config.max_queue_depth = 1;
    let driver = DiscoveryDriver::new(
        stores.clone(),
        Arc::new(PipelineStats::new()),
        config,
        CancellationToken::new(),
    );
    let discoverer =
        ScriptedDiscoverer::new().with_items("seed", vec![item("first", "1"), item("second", "2")]);

    // --- 2. Act ---
    let task = tokio::spawn(async move {
        driver
            .run_discovery(&discoverer, &["seed".to_string()], 1)
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // --- 3. Assert ---
    assert!(!task.is_finished());
    assert_eq!(stores.queue.len(), 1);
    assert!(!stores.content.raw_path("second").exists());

    stores.queue.remove("first").unwrap();
    let report = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(report.enqueued(), 2);
    assert!(stores.queue.contains("second"));
}

#[tokio::test]
async fn test_shutdown_interrupts_backpressure_wait() {
    // --- 1. Arrange ---
    setup_tracing();
    let dir = tempdir().unwrap();
    let stores = open_stores(dir.path());
    let mut config = fast_config().discovery;
    config.max_queue_depth = 1;
    let shutdown = CancellationToken::new();
    let driver = DiscoveryDriver::new(
        stores.clone(),
        Arc::new(PipelineStats::new()),
        config,
        shutdown.clone(),
    );
    let discoverer =
        ScriptedDiscoverer::new().with_items("seed", vec![item("first", "1"), item("second", "2")]);

    // --- 2. Act ---
    let task = tokio::spawn(async move {
        driver
            .run_discovery(&discoverer, &["seed".to_string()], 1)
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();

    // --- 3. Assert ---
    let report = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(report.interrupted);
    assert_eq!(stores.queue.len(), 1);
}

#[tokio::test]
async fn test_abandoned_item_is_queued_again_on_a_later_pass() {
    // --- 1. Arrange ---
    setup_tracing();
    let dir = tempdir().unwrap();
    let stores = open_stores(dir.path());
    stores
        .errors
        .record("flaky", Stage::Abandoned, "gave up after 3 attempts");
    let driver = DiscoveryDriver::new(
        stores.clone(),
        Arc::new(PipelineStats::new()),
        fast_config().discovery,
        CancellationToken::new(),
    );
    let discoverer =
        ScriptedDiscoverer::new().with_items("seed", vec![item("flaky", "new content")]);

    // --- 2. Act ---
    let report = driver
        .run_discovery(&discoverer, &["seed".to_string()], 1)
        .await
        .unwrap();

    // --- 3. Assert ---
    assert_eq!(report.enqueued(), 1);
    let entries = stores.queue.peek_all();
    assert_eq!(entries[0].identifier, "flaky");
    assert_eq!(entries[0].attempt, 0);
    let raw = std::fs::read_to_string(&entries[0].source_content_path).unwrap();
    assert!(raw.ends_with("new content"));
}
