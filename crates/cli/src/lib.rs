//! # Distill Command Line
//!
//! Shared plumbing for the `distill-crawl` and `distill-feed` binaries: the
//! argument parser, seed file reading, logging setup and the run loop that
//! drives discovery and the queue worker.

pub mod config;

use anyhow::{bail, Context, Result};
use clap::Parser;
use distill::{
    build_generator, ingest::Discoverer, providers::ai::Generator, store::DataLayout,
    DiscoveryReport, Pipeline,
};
use distill_rss::FeedDiscoverer;
use distill_web::WebCrawler;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{load_config, AppConfig};

const DEFAULT_LOG_FILTER: &str = "distill=info,distill_web=info,distill_rss=info,distill_cli=info";

/// Discovers content from a list of seeds and summarizes it into the data
/// directory.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File with one seed per line; blank lines and `#` comments are ignored.
    #[arg(long, default_value = "input.txt")]
    pub seeds: PathBuf,

    /// YAML configuration file. Defaults to `distill.yml` if present.
    #[arg(long, env = "DISTILL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides `data_dir` from the configuration.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// How many times to walk the seed list.
    #[arg(long, default_value_t = 1)]
    pub iterations: u32,

    /// Keep the worker running after the queue drains, until Ctrl-C.
    #[arg(long)]
    pub keep_running: bool,

    /// Log to stderr instead of the log file. Disables the stats display.
    #[arg(long)]
    pub log_stderr: bool,
}

/// Which discoverer a binary drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Crawl,
    Feed,
}

/// What a finished run left behind.
#[derive(Debug)]
pub struct RunSummary {
    pub report: DiscoveryReport,
    /// Whether the queue emptied before shutdown.
    pub drained: bool,
    pub processed: usize,
    pub queued: usize,
    pub errors: usize,
}

/// Reads seeds from `path`, one per line.
pub fn read_seeds(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;
    let seeds: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();
    if seeds.is_empty() {
        bail!("Seed file '{}' contains no seeds", path.display());
    }
    Ok(seeds)
}

/// Installs the global tracing subscriber, writing either to stderr or
/// appending to `log_file`. `RUST_LOG` overrides the default filter.
pub fn init_logging(log_file: &Path, to_stderr: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if to_stderr {
        let subscriber = fmt::Subscriber::builder()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set global tracing subscriber")?;
        return Ok(());
    }

    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory '{}'", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file '{}'", log_file.display()))?;
    let subscriber = fmt::Subscriber::builder()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global tracing subscriber")?;
    Ok(())
}

/// Entry point shared by both binaries.
pub async fn run(cli: Cli, source: Source) -> Result<RunSummary> {
    dotenvy::dotenv().ok();
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    init_logging(&config.log_file, cli.log_stderr)?;

    let seeds = read_seeds(&cli.seeds)?;
    let generator = build_generator(
        &config.generator,
        config.pipeline.summarizer.request_timeout(),
    )?;

    let summary = match source {
        Source::Crawl => {
            let crawler = WebCrawler::new(config.crawl.clone())?;
            run_pipeline(&cli, &config, &seeds, &crawler, generator).await?
        }
        Source::Feed => {
            let feeds =
                FeedDiscoverer::new(Duration::from_millis(config.feed.request_timeout_ms))?;
            run_pipeline(&cli, &config, &seeds, &feeds, generator).await?
        }
    };

    info!(
        "Run finished: {} enqueued, {} skipped, {} processed, {} still queued",
        summary.report.enqueued(),
        summary.report.skipped(),
        summary.processed,
        summary.queued
    );
    Ok(summary)
}

/// Opens the pipeline under `config.data_dir`, runs discovery over `seeds`
/// and then waits for the queue to drain (or for Ctrl-C with
/// `--keep-running`).
pub async fn run_pipeline(
    cli: &Cli,
    config: &AppConfig,
    seeds: &[String],
    discoverer: &dyn Discoverer,
    generator: Box<dyn Generator>,
) -> Result<RunSummary> {
    let layout = DataLayout::under(config.data_dir.clone());
    let mut pipeline = Pipeline::open(layout, config.pipeline.clone(), generator)?;
    if cli.log_stderr {
        pipeline = pipeline.without_reporter();
    }

    let shutdown = pipeline.shutdown_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; shutting down");
            shutdown.cancel();
        }
    });

    pipeline.start();
    info!(
        "Discovering with '{}' over {} seeds",
        discoverer.name(),
        seeds.len()
    );
    let report = match pipeline
        .run_discovery(discoverer, seeds, cli.iterations)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            if let Err(worker_err) = pipeline.shutdown().await {
                warn!("Queue worker also failed: {worker_err}");
            }
            ctrl_c.abort();
            return Err(e.into());
        }
    };

    let drained = if cli.keep_running {
        pipeline.shutdown_token().cancelled().await;
        pipeline.stores().queue.is_empty()
    } else {
        pipeline.wait_until_drained().await
    };

    let stores = pipeline.stores().clone();
    let stopped = pipeline.shutdown().await;
    ctrl_c.abort();
    stopped?;

    Ok(RunSummary {
        report,
        drained,
        processed: stores.processed.len(),
        queued: stores.queue.len(),
        errors: stores.errors.records().len(),
    })
}
