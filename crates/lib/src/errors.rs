use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid or missing configuration. Always fatal at startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("overlap ({overlap}) must be smaller than the window size ({window_size})")]
    InvalidWindow { window_size: usize, overlap: usize },
    #[error("Required configuration is missing: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failures reading or writing a persisted store or artifact.
///
/// Read failures are recovered by the stores (they start empty); write
/// failures propagate so the in-memory state never silently diverges from disk.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse '{path}': {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize store for '{path}': {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A transient failure talking to the generation endpoint.
#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("Request to generation endpoint failed: {0}")]
    Request(reqwest::Error),
    #[error("Generation endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to deserialize generation response: {0}")]
    Deserialize(String),
    #[error("Generation request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Generation endpoint returned an empty response")]
    EmptyResponse,
}

/// The summarizer could not produce a final summary.
#[derive(Error, Debug)]
pub enum SummarizationError {
    #[error("Nothing to summarize")]
    EmptyInput,
    #[error("Chunk {index} failed after {attempts} attempts: {source}")]
    Chunk {
        index: usize,
        attempts: u32,
        #[source]
        source: EndpointError,
    },
    #[error("Summary still has {len} characters after {depth} reduction rounds")]
    Oversized { depth: u32, len: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A source plugin failed; aborts only the current seed.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Invalid seed '{0}'")]
    InvalidSeed(String),
    #[error("Failed to fetch from the source: {0}")]
    Fetch(String),
    #[error("Failed to parse content from the source: {0}")]
    Parse(String),
    #[error("Discovery interrupted by shutdown")]
    Interrupted,
}

/// Umbrella error for pipeline entry points.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("Summarization error: {0}")]
    Summarization(#[from] SummarizationError),
}
