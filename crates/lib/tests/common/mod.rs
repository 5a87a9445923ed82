#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Scripted generators and discoverers that let the pipeline run without a
//! network or a model.

use async_trait::async_trait;
use distill::{
    config::{PipelineConfig, SummarizerConfig},
    errors::{DiscoveryError, EndpointError},
    ingest::{DiscoveredItem, Discoverer},
    providers::ai::Generator,
    store::{DataLayout, PipelineStores},
};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber once per test binary.
pub fn setup_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "distill=debug".into()),
            )
            .try_init();
    });
}

// --- Scripted Generator ---

/// One scripted reply.
#[derive(Clone, Debug)]
pub enum Reply {
    Text(String),
    /// Fails with the given HTTP status.
    Status(u16),
    /// Never answers; the summarizer's timeout has to fire.
    Hang,
}

/// Answers calls with scripted replies in order, then with `fallback`.
#[derive(Clone, Debug)]
pub struct ScriptedGenerator {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    fallback: Reply,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Reply>, fallback: Reply) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            fallback,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answers with `text`.
    pub fn always(text: &str) -> Self {
        Self::new(Vec::new(), Reply::Text(text.to_string()))
    }

    /// Always fails with a 500.
    pub fn failing() -> Self {
        Self::new(Vec::new(), Reply::Status(500))
    }

    /// Every `(system_prompt, user_prompt)` received so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, EndpointError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Status(status) => Err(EndpointError::Status {
                status,
                body: "scripted failure".to_string(),
            }),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(EndpointError::EmptyResponse)
            }
        }
    }
}

// --- Scripted Discoverer ---

/// Yields fixed items per seed. A seed mapped to `Err` fails after the items
/// listed before the error.
#[derive(Clone, Debug, Default)]
pub struct ScriptedDiscoverer {
    seeds: HashMap<String, Vec<Result<DiscoveredItem, String>>>,
}

impl ScriptedDiscoverer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(mut self, seed: &str, items: Vec<DiscoveredItem>) -> Self {
        self.seeds
            .insert(seed.to_string(), items.into_iter().map(Ok).collect());
        self
    }

    pub fn with_results(mut self, seed: &str, results: Vec<Result<DiscoveredItem, String>>) -> Self {
        self.seeds.insert(seed.to_string(), results);
        self
    }
}

impl Discoverer for ScriptedDiscoverer {
    fn name(&self) -> &str {
        "scripted"
    }

    fn discover<'a>(
        &'a self,
        seed: &'a str,
    ) -> BoxStream<'a, Result<DiscoveredItem, DiscoveryError>> {
        match self.seeds.get(seed) {
            Some(results) => stream::iter(results.clone())
                .map(|result| result.map_err(DiscoveryError::Fetch))
                .boxed(),
            None => stream::once(async move { Err(DiscoveryError::InvalidSeed(seed.to_string())) })
                .boxed(),
        }
    }
}

// --- Fixtures ---

/// Small windows and no backoff so tests run fast.
pub fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.summarizer = SummarizerConfig {
        window_size: 50,
        overlap: 10,
        context_window: 1_000,
        max_attempts: 2,
        request_timeout_ms: 2_000,
        backoff_base_ms: 0,
        backoff_max_ms: 0,
        backoff_jitter_ms: 0,
        ..SummarizerConfig::default()
    };
    config.worker.poll_interval_ms = 10;
    config.worker.retry_ceiling = 2;
    config.discovery.backpressure_poll_ms = 10;
    config.stats.interval_ms = 20;
    config.stats.clear_screen = false;
    config
}

pub fn open_stores(root: &std::path::Path) -> PipelineStores {
    PipelineStores::open(&DataLayout::under(root), 100).unwrap()
}

pub fn item(id: &str, content: &str) -> DiscoveredItem {
    DiscoveredItem::new(id, content).with_metadata("URL", id)
}
