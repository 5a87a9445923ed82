//! # Summarizer Tests
//!
//! Retry, failure propagation and bounded reduction, driven by a scripted
//! generator.

mod common;

use common::{fast_config, setup_tracing, Reply, ScriptedGenerator};
use distill::config::SummarizerConfig;
use distill::errors::{ConfigError, EndpointError, SummarizationError};
use distill::prompts::{REDUCTION_SYSTEM_PROMPT, SUMMARIZATION_SYSTEM_PROMPT};
use distill::summarize::Summarizer;

fn config() -> SummarizerConfig {
    fast_config().summarizer
}

fn text(s: &str) -> Reply {
    Reply::Text(s.to_string())
}

#[tokio::test]
async fn test_summarizes_each_chunk_and_joins() {
    // --- 1. Arrange ---
    setup_tracing();
    let generator = ScriptedGenerator::new(vec![text("one"), text("two")], Reply::Status(500));
    let summarizer = Summarizer::new(Box::new(generator.clone()), config()).unwrap();
    let chunks = vec!["first chunk".to_string(), "second chunk".to_string()];

    // --- 2. Act ---
    let summary = summarizer.summarize(&chunks).await.unwrap();

    // --- 3. Assert ---
    assert_eq!(summary, "one\n\ntwo");
    let calls = generator.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, SUMMARIZATION_SYSTEM_PROMPT);
    assert!(calls[0].1.contains("first chunk"));
    assert!(calls[1].1.contains("second chunk"));
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    // --- 1. Arrange ---
    setup_tracing();
    let generator = ScriptedGenerator::new(vec![Reply::Status(503), text("ok")], Reply::Status(500));
    let summarizer = Summarizer::new(Box::new(generator.clone()), config()).unwrap();

    // --- 2. Act ---
    let summary = summarizer.summarize(&["chunk".to_string()]).await.unwrap();

    // --- 3. Assert ---
    assert_eq!(summary, "ok");
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn test_empty_response_counts_as_failure() {
    setup_tracing();
    let generator = ScriptedGenerator::new(vec![text("   "), text("real")], Reply::Status(500));
    let summarizer = Summarizer::new(Box::new(generator.clone()), config()).unwrap();

    let summary = summarizer.summarize(&["chunk".to_string()]).await.unwrap();

    assert_eq!(summary, "real");
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn test_chunk_failure_after_retries_fails_the_call() {
    // --- 1. Arrange ---
    setup_tracing();
    let generator = ScriptedGenerator::new(vec![text("fine")], Reply::Status(500));
    let summarizer = Summarizer::new(Box::new(generator.clone()), config()).unwrap();
    let chunks = vec!["a".to_string(), "b".to_string()];

    // --- 2. Act ---
    let result = summarizer.summarize(&chunks).await;

    // --- 3. Assert ---
    match result {
        Err(SummarizationError::Chunk {
            index,
            attempts,
            source: EndpointError::Status { status, .. },
        }) => {
            assert_eq!(index, 1);
            assert_eq!(attempts, 2);
            assert_eq!(status, 500);
        }
        other => panic!("Expected a chunk failure, got {other:?}"),
    }
    // One call for chunk 0, two attempts for chunk 1.
    assert_eq!(generator.call_count(), 3);
}

#[tokio::test]
async fn test_hung_request_times_out() {
    setup_tracing();
    let generator = ScriptedGenerator::new(vec![Reply::Hang], Reply::Text("after".to_string()));
    let mut cfg = config();
    cfg.request_timeout_ms = 50;
    let summarizer = Summarizer::new(Box::new(generator.clone()), cfg).unwrap();

    let summary = summarizer.summarize(&["chunk".to_string()]).await.unwrap();

    assert_eq!(summary, "after");
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn test_empty_input_is_rejected() {
    let generator = ScriptedGenerator::always("never");
    let summarizer = Summarizer::new(Box::new(generator.clone()), config()).unwrap();

    assert!(matches!(
        summarizer.summarize(&[]).await,
        Err(SummarizationError::EmptyInput)
    ));
    assert!(matches!(
        summarizer.summarize(&["  \n".to_string()]).await,
        Err(SummarizationError::EmptyInput)
    ));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_oversized_merge_is_reduced() {
    // --- 1. Arrange ---
    setup_tracing();
    let long = "x".repeat(40);
    let generator = ScriptedGenerator::new(
        vec![text(&long), text(&long), text("merged")],
        Reply::Status(500),
    );
    let mut cfg = config();
    cfg.context_window = 60;
    cfg.window_size = 200;
    cfg.overlap = 0;
    let summarizer = Summarizer::new(Box::new(generator.clone()), cfg).unwrap();

    // --- 2. Act ---
    let summary = summarizer
        .summarize(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();

    // --- 3. Assert ---
    assert_eq!(summary, "merged");
    let calls = generator.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2].0, REDUCTION_SYSTEM_PROMPT);
}

#[tokio::test]
async fn test_reduction_depth_is_bounded() {
    // --- 1. Arrange ---
    setup_tracing();
    let generator = ScriptedGenerator::always(&"y".repeat(100));
    let mut cfg = config();
    cfg.context_window = 10;
    cfg.max_reduction_depth = 2;
    let summarizer = Summarizer::new(Box::new(generator.clone()), cfg).unwrap();

    // --- 2. Act ---
    let result = summarizer.summarize(&["input".to_string()]).await;

    // --- 3. Assert ---
    match result {
        Err(SummarizationError::Oversized { depth, len }) => {
            assert_eq!(depth, 2);
            assert!(len > 10);
        }
        other => panic!("Expected an oversized error, got {other:?}"),
    }
}

#[test]
fn test_overlap_equal_to_window_is_rejected() {
    let generator = ScriptedGenerator::always("x");
    let mut cfg = config();
    cfg.overlap = cfg.window_size;
    assert!(matches!(
        Summarizer::new(Box::new(generator), cfg),
        Err(ConfigError::InvalidWindow { .. })
    ));
}

#[tokio::test]
async fn test_custom_prompt_templates_are_used() {
    let generator = ScriptedGenerator::always("x");
    let mut cfg = config();
    cfg.system_prompt = Some("custom system".to_string());
    cfg.user_prompt = Some("<<{text}>>".to_string());
    let summarizer = Summarizer::new(Box::new(generator.clone()), cfg).unwrap();

    summarizer.summarize(&["body".to_string()]).await.unwrap();

    let calls = generator.calls();
    assert_eq!(calls[0].0, "custom system");
    assert_eq!(calls[0].1, "<<body>>");
}
