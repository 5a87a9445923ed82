//! # Pipeline Configuration
//!
//! Plain, deserializable settings for every pipeline component. Binaries
//! layer a config file and environment variables on top of the defaults.

use crate::errors::ConfigError;
use crate::providers::ai::ollama::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
use crate::store::error_log::DEFAULT_ERROR_LOG_CAPACITY;
use serde::Deserialize;
use std::time::Duration;

/// Settings for chunking and the summarization calls.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SummarizerConfig {
    /// Characters per chunk sent to the endpoint.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Characters shared between consecutive chunks.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    /// Largest merged summary accepted without another reduction round.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default = "default_max_reduction_depth")]
    pub max_reduction_depth: u32,
    /// Calls per chunk before giving up, first call included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_backoff_jitter_ms")]
    pub backoff_jitter_ms: u64,
    /// Overrides the built-in system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Overrides the built-in user prompt. `{text}` is replaced by the chunk.
    #[serde(default)]
    pub user_prompt: Option<String>,
}

fn default_window_size() -> usize {
    5000
}
fn default_overlap() -> usize {
    500
}
fn default_context_window() -> usize {
    5000
}
fn default_max_reduction_depth() -> u32 {
    3
}
fn default_max_attempts() -> u32 {
    3
}
fn default_request_timeout_ms() -> u64 {
    120_000
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_backoff_max_ms() -> u64 {
    8_000
}
fn default_backoff_jitter_ms() -> u64 {
    250
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            overlap: default_overlap(),
            context_window: default_context_window(),
            max_reduction_depth: default_max_reduction_depth(),
            max_attempts: default_max_attempts(),
            request_timeout_ms: default_request_timeout_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            backoff_jitter_ms: default_backoff_jitter_ms(),
            system_prompt: None,
            user_prompt: None,
        }
    }
}

impl SummarizerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Wait between polls of an empty queue.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Requeues allowed before an entry is abandoned.
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,
}

fn default_poll_interval_ms() -> u64 {
    100
}
fn default_retry_ceiling() -> u32 {
    3
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            retry_ceiling: default_retry_ceiling(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DiscoveryConfig {
    /// Discovery pauses while the queue holds this many entries.
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,
    #[serde(default = "default_backpressure_poll_ms")]
    pub backpressure_poll_ms: u64,
}

fn default_max_queue_depth() -> usize {
    100
}
fn default_backpressure_poll_ms() -> u64 {
    1_000
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: default_max_queue_depth(),
            backpressure_poll_ms: default_backpressure_poll_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StatsConfig {
    #[serde(default = "default_stats_interval_ms")]
    pub interval_ms: u64,
    /// Clears the terminal before each snapshot.
    #[serde(default = "default_clear_screen")]
    pub clear_screen: bool,
    #[serde(default = "default_recent_errors")]
    pub recent_errors: usize,
}

fn default_stats_interval_ms() -> u64 {
    1_000
}
fn default_clear_screen() -> bool {
    true
}
fn default_recent_errors() -> usize {
    5
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_stats_interval_ms(),
            clear_screen: default_clear_screen(),
            recent_errors: default_recent_errors(),
        }
    }
}

/// Everything the pipeline core needs.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PipelineConfig {
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default = "default_error_log_capacity")]
    pub error_log_capacity: usize,
}

fn default_error_log_capacity() -> usize {
    DEFAULT_ERROR_LOG_CAPACITY
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            summarizer: SummarizerConfig::default(),
            worker: WorkerConfig::default(),
            discovery: DiscoveryConfig::default(),
            stats: StatsConfig::default(),
            error_log_capacity: default_error_log_capacity(),
        }
    }
}

impl PipelineConfig {
    /// Rejects settings that would make a component loop forever or drop
    /// every record.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.summarizer;
        if s.overlap >= s.window_size {
            return Err(ConfigError::InvalidWindow {
                window_size: s.window_size,
                overlap: s.overlap,
            });
        }
        if s.context_window == 0 {
            return Err(ConfigError::Invalid(
                "summarizer.context_window must be greater than zero".to_string(),
            ));
        }
        if s.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "summarizer.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.error_log_capacity == 0 {
            return Err(ConfigError::Invalid(
                "error_log_capacity must be greater than zero".to_string(),
            ));
        }
        if self.discovery.max_queue_depth == 0 {
            return Err(ConfigError::Invalid(
                "discovery.max_queue_depth must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which generation endpoint to call and how.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// `ollama`, `local` (OpenAI-compatible) or `gemini`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_api_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}
fn default_model_name() -> String {
    DEFAULT_OLLAMA_MODEL.to_string()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_url: default_api_url(),
            api_key: None,
            model_name: default_model_name(),
        }
    }
}
