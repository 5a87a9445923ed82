use clap::Parser;
use distill::{build_generator, ingest::DiscoveredItem};
use distill_cli::{config::AppConfig, read_seeds, run_pipeline, Cli};
use distill_test_utils::{MockGenerator, StaticDiscoverer, TestWorkspace};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn quiet_cli() -> Cli {
    Cli::parse_from(["distill-crawl", "--log-stderr"])
}

fn app_config(workspace: &TestWorkspace) -> AppConfig {
    AppConfig {
        data_dir: workspace.layout.root.clone(),
        pipeline: workspace.fast_config(),
        ..AppConfig::default()
    }
}

fn summary_count(workspace: &TestWorkspace) -> usize {
    std::fs::read_dir(&workspace.layout.summary_dir)
        .unwrap()
        .count()
}

#[test]
fn test_cli_defaults() {
    let cli = Cli::parse_from(["distill-feed"]);
    assert_eq!(cli.seeds.to_str(), Some("input.txt"));
    assert_eq!(cli.iterations, 1);
    assert!(!cli.keep_running);
    assert!(!cli.log_stderr);
    assert!(cli.data_dir.is_none());
}

#[test]
fn test_read_seeds_skips_blank_and_comment_lines() {
    // --- Arrange ---
    let workspace = TestWorkspace::new().unwrap();
    let path = workspace
        .write_seeds(&[
            "# blogs",
            "https://example.com/",
            "",
            "   https://example.org/feed.xml  ",
        ])
        .unwrap();

    // --- Act ---
    let seeds = read_seeds(&path).unwrap();

    // --- Assert ---
    assert_eq!(
        seeds,
        vec!["https://example.com/", "https://example.org/feed.xml"]
    );
}

#[test]
fn test_read_seeds_rejects_files_without_seeds() {
    let workspace = TestWorkspace::new().unwrap();
    let path = workspace.write_seeds(&["# nothing yet", "  "]).unwrap();

    let err = read_seeds(&path).unwrap_err();
    assert!(err.to_string().contains("contains no seeds"));
}

#[test]
fn test_read_seeds_missing_file() {
    let workspace = TestWorkspace::new().unwrap();
    let err = read_seeds(&workspace.path().join("missing.txt")).unwrap_err();
    assert!(err.to_string().contains("Failed to read seed file"));
}

#[tokio::test]
async fn test_run_pipeline_drains_discovered_items() {
    // --- Arrange ---
    let workspace = TestWorkspace::new().unwrap();
    let config = app_config(&workspace);
    let discoverer = StaticDiscoverer::new(vec![
        DiscoveredItem::new("https://example.com/a", "First article body."),
        DiscoveredItem::new("https://example.com/b", "Second article body."),
    ]);
    let generator = MockGenerator::new();
    let seeds = vec!["https://example.com/".to_string()];

    // --- Act ---
    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        run_pipeline(
            &quiet_cli(),
            &config,
            &seeds,
            &discoverer,
            Box::new(generator.clone()),
        ),
    )
    .await
    .expect("run did not finish")
    .unwrap();

    // --- Assert ---
    assert!(summary.drained);
    assert_eq!(summary.report.enqueued(), 2);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.queued, 0);
    assert_eq!(summary.errors, 0);
    assert_eq!(generator.get_calls().len(), 2);
    assert_eq!(summary_count(&workspace), 2);
}

#[tokio::test]
async fn test_second_run_skips_processed_items() {
    // --- Arrange ---
    let workspace = TestWorkspace::new().unwrap();
    let config = app_config(&workspace);
    let discoverer =
        StaticDiscoverer::new(vec![DiscoveredItem::new("item-1", "Some text to summarize.")]);
    let seeds = vec!["seed".to_string()];
    run_pipeline(
        &quiet_cli(),
        &config,
        &seeds,
        &discoverer,
        Box::new(MockGenerator::new()),
    )
    .await
    .unwrap();

    // --- Act ---
    let generator = MockGenerator::new();
    let summary = run_pipeline(
        &quiet_cli(),
        &config,
        &seeds,
        &discoverer,
        Box::new(generator.clone()),
    )
    .await
    .unwrap();

    // --- Assert ---
    assert_eq!(summary.report.enqueued(), 0);
    assert_eq!(summary.report.skipped(), 1);
    assert_eq!(summary.processed, 1);
    assert!(generator.get_calls().is_empty());
}

#[tokio::test]
async fn test_run_pipeline_against_ollama_endpoint() {
    // --- Arrange ---
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"response\":\"Short \",\"done\":false}\n{\"response\":\"summary.\",\"done\":true}\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let workspace = TestWorkspace::new().unwrap();
    let mut config = app_config(&workspace);
    config.generator.api_url = format!("{}/api/generate", server.uri());
    let generator = build_generator(
        &config.generator,
        config.pipeline.summarizer.request_timeout(),
    )
    .unwrap();
    let discoverer = StaticDiscoverer::new(vec![DiscoveredItem::new(
        "https://example.com/post",
        "A post about queues.",
    )]);

    // --- Act ---
    let summary = run_pipeline(
        &quiet_cli(),
        &config,
        &["https://example.com/".to_string()],
        &discoverer,
        generator,
    )
    .await
    .unwrap();

    // --- Assert ---
    assert_eq!(summary.processed, 1);
    let stores = workspace.stores().unwrap();
    let written =
        std::fs::read_to_string(stores.content.summary_path("https://example.com/post")).unwrap();
    assert!(written.contains("Short summary."));
}

#[tokio::test]
async fn test_failing_seed_is_reported_and_run_continues() {
    // --- Arrange ---
    let workspace = TestWorkspace::new().unwrap();
    let config = app_config(&workspace);
    let discoverer = StaticDiscoverer::new(vec![DiscoveredItem::new("good", "Good text.")])
        .fail_seed("https://broken.example/");
    let seeds = vec![
        "https://broken.example/".to_string(),
        "https://fine.example/".to_string(),
    ];

    // --- Act ---
    let summary = run_pipeline(
        &quiet_cli(),
        &config,
        &seeds,
        &discoverer,
        Box::new(MockGenerator::new()),
    )
    .await
    .unwrap();

    // --- Assert ---
    assert_eq!(summary.report.failed_seeds, 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.errors, 1);
    assert_eq!(discoverer.seeds_seen().len(), 2);
}

#[tokio::test]
async fn test_unwritable_queue_fails_the_run() {
    // --- Arrange ---
    let workspace = TestWorkspace::new().unwrap();
    let config = app_config(&workspace);
    std::fs::create_dir_all(workspace.layout.queue_file.join("blocker")).unwrap();
    let discoverer = StaticDiscoverer::new(vec![DiscoveredItem::new("item", "Some text.")]);

    // --- Act ---
    let result = tokio::time::timeout(
        Duration::from_secs(10),
        run_pipeline(
            &quiet_cli(),
            &config,
            &["seed".to_string()],
            &discoverer,
            Box::new(MockGenerator::new()),
        ),
    )
    .await
    .expect("run did not finish");

    // --- Assert ---
    assert!(result.is_err());
}
