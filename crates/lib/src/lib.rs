//! # Distill
//!
//! A persistent work-queue pipeline that turns discovered source content into
//! summaries. Source plugins yield items, the discovery loop stores their raw
//! content and queues them, and a single worker summarizes queued items
//! through a text-generation endpoint. Every piece of state lives in plain
//! files under one data directory, so a stopped or crashed run resumes where
//! it left off.

pub mod chunk;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod stats;
pub mod store;
pub mod summarize;
pub mod worker;

pub use chunk::{join_windows, split_into_windows};
pub use config::{
    DiscoveryConfig, GeneratorConfig, PipelineConfig, StatsConfig, SummarizerConfig, WorkerConfig,
};
pub use errors::{
    ConfigError, DiscoveryError, EndpointError, PipelineError, StorageError, SummarizationError,
};
pub use ingest::{DiscoveredItem, Discoverer, DiscoveryDriver, DiscoveryReport, SeedReport};
pub use pipeline::Pipeline;
pub use providers::{ai::Generator, build_generator};
pub use stats::{PipelineStats, StatsReporter, StatsSnapshot};
pub use store::{
    ContentStore, DataLayout, DurableQueue, DurableSet, EnqueueOutcome, ErrorLog, ErrorRecord,
    PipelineStores, QueueEntry, Stage,
};
pub use summarize::Summarizer;
pub use worker::{QueueWorker, WorkOutcome};
