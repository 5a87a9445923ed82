//! # Application Configuration
//!
//! Loads `AppConfig` for the binaries in layers: built-in defaults, then an
//! optional YAML file with `${VAR}` substitution, then `DISTILL_`-prefixed
//! environment variables.

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use distill::config::{GeneratorConfig, PipelineConfig};
use distill_web::CrawlConfig;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "distill.yml";

#[derive(Error, Debug)]
pub enum AppConfigError {
    /// Indicates an error from the underlying `config` crate.
    #[error("Configuration error: {0}")]
    General(String),
    /// Indicates a required configuration file was not found.
    #[error("{0}")]
    NotFound(String),
}

impl From<config::ConfigError> for AppConfigError {
    fn from(err: config::ConfigError) -> Self {
        AppConfigError::General(err.to_string())
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FeedConfig {
    #[serde(default = "default_feed_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_feed_timeout_ms() -> u64 {
    10_000
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_feed_timeout_ms(),
        }
    }
}

/// The root configuration structure, mapping directly to `distill.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Holds every store and artifact directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("distill.log")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_file: default_log_file(),
            generator: GeneratorConfig::default(),
            pipeline: PipelineConfig::default(),
            crawl: CrawlConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

/// Replaces `${VAR}` with the value of the environment variable `VAR`, or
/// with nothing when it is unset.
pub fn substitute_env(content: &str) -> String {
    let Ok(re) = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}") else {
        return content.to_string();
    };
    re.replace_all(content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    })
    .into_owned()
}

// Returns Ok(None) if the file does not exist, or an error if it fails to read.
fn read_and_substitute(path: &Path) -> Result<Option<String>, AppConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| {
        AppConfigError::General(format!(
            "Failed to read config file '{}': {e}",
            path.display()
        ))
    })?;
    Ok(Some(substitute_env(&content)))
}

/// Loads the application configuration.
///
/// - `config_path_override` must exist when given; otherwise `distill.yml` in
///   the working directory is used if present.
/// - Nested keys are overridden by `DISTILL_...` variables, e.g.
///   `DISTILL_GENERATOR__MODEL_NAME` or `DISTILL_PIPELINE__WORKER__RETRY_CEILING`.
pub fn load_config(config_path_override: Option<&Path>) -> Result<AppConfig, AppConfigError> {
    let mut builder = ConfigBuilder::builder();

    let (path, required) = match config_path_override {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match read_and_substitute(&path)? {
        Some(content) => {
            info!("Loading configuration from '{}'.", path.display());
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
        None if required => {
            return Err(AppConfigError::NotFound(format!(
                "Config file not found at '{}'.",
                path.display()
            )))
        }
        None => info!("No '{DEFAULT_CONFIG_FILE}' found; using defaults."),
    }

    let settings = builder
        .add_source(
            Environment::with_prefix("DISTILL")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("crawl.unwanted_segments")
                .with_list_parse_key("crawl.strip_patterns"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
