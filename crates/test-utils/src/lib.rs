use anyhow::Result;
use async_trait::async_trait;
use distill::{
    config::PipelineConfig,
    errors::{DiscoveryError, EndpointError},
    ingest::{DiscoveredItem, Discoverer},
    providers::ai::Generator,
    store::{DataLayout, PipelineStores},
};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// --- Test Setup ---

/// An isolated data directory that is deleted when dropped.
pub struct TestWorkspace {
    dir: TempDir,
    pub layout: DataLayout,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let layout = DataLayout::under(dir.path().join("data"));
        Ok(Self { dir, layout })
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Opens the stores under this workspace's data directory.
    pub fn stores(&self) -> Result<PipelineStores> {
        Ok(PipelineStores::open(&self.layout, 100)?)
    }

    /// Writes a seed file with one seed per line and returns its path.
    pub fn write_seeds(&self, seeds: &[&str]) -> Result<PathBuf> {
        let path = self.dir.path().join("input.txt");
        std::fs::write(&path, seeds.join("\n"))?;
        Ok(path)
    }

    /// A pipeline config with short polls, no backoff and no screen clearing.
    pub fn fast_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.summarizer.backoff_base_ms = 0;
        config.summarizer.backoff_max_ms = 0;
        config.summarizer.backoff_jitter_ms = 0;
        config.summarizer.request_timeout_ms = 5_000;
        config.worker.poll_interval_ms = 10;
        config.discovery.backpressure_poll_ms = 10;
        config.stats.interval_ms = 50;
        config.stats.clear_screen = false;
        config
    }
}

// --- Mock Generator ---

#[derive(Clone, Debug)]
pub struct MockGenerator {
    responses: Arc<Mutex<HashMap<String, String>>>,
    default_response: Option<String>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockGenerator {
    /// Answers every prompt with `"Mock summary"` unless a keyed response
    /// matches.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            default_response: Some("Mock summary".to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fails every prompt that no keyed response matches.
    pub fn strict() -> Self {
        Self {
            default_response: None,
            ..Self::new()
        }
    }

    /// Pre-programs a response for a prompt.
    /// The key should be a unique substring of the user prompt.
    pub fn add_response(&self, key: &str, response: &str) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(key.to_string(), response.to_string());
    }

    /// Retrieves the recorded calls for assertion.
    pub fn get_calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, EndpointError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push((system_prompt.to_string(), user_prompt.to_string()));

        let responses = self.responses.lock().unwrap();
        for (key, response) in responses.iter() {
            if user_prompt.contains(key) {
                return Ok(response.clone());
            }
        }

        self.default_response
            .clone()
            .ok_or_else(|| EndpointError::Status {
                status: 500,
                body: format!("MockGenerator: No response programmed. Got: '{user_prompt}'"),
            })
    }
}

// --- Static Discoverer ---

/// Yields the same items for every seed, or an error for seeds registered
/// with `fail_seed`.
#[derive(Clone, Debug, Default)]
pub struct StaticDiscoverer {
    items: Vec<DiscoveredItem>,
    failing_seeds: Vec<String>,
    seeds_seen: Arc<Mutex<Vec<String>>>,
}

impl StaticDiscoverer {
    pub fn new(items: Vec<DiscoveredItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn fail_seed(mut self, seed: &str) -> Self {
        self.failing_seeds.push(seed.to_string());
        self
    }

    /// Seeds passed to `discover`, in call order.
    pub fn seeds_seen(&self) -> Vec<String> {
        self.seeds_seen.lock().unwrap().clone()
    }
}

impl Discoverer for StaticDiscoverer {
    fn name(&self) -> &str {
        "static"
    }

    fn discover<'a>(
        &'a self,
        seed: &'a str,
    ) -> BoxStream<'a, Result<DiscoveredItem, DiscoveryError>> {
        self.seeds_seen.lock().unwrap().push(seed.to_string());
        if self.failing_seeds.iter().any(|s| s == seed) {
            return stream::once(async move {
                Err(DiscoveryError::Fetch(format!("static failure for {seed}")))
            })
            .boxed();
        }
        stream::iter(self.items.clone().into_iter().map(Ok)).boxed()
    }
}
