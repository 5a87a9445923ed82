//! # Pipeline
//!
//! Wires the stores, the summarizer, the queue worker and the stats reporter
//! together. Discovery runs on the caller's task; the worker and the reporter
//! run as background tasks until `shutdown`.

use crate::{
    config::PipelineConfig,
    errors::{PipelineError, StorageError},
    ingest::{Discoverer, DiscoveryDriver, DiscoveryReport},
    providers::ai::Generator,
    stats::{PipelineStats, StatsReporter},
    store::{DataLayout, PipelineStores},
    summarize::Summarizer,
    worker::QueueWorker,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

enum ReporterOutput {
    Stdout,
    Custom(Box<dyn Write + Send>),
    Disabled,
}

pub struct Pipeline {
    layout: DataLayout,
    config: PipelineConfig,
    stores: PipelineStores,
    stats: Arc<PipelineStats>,
    shutdown: CancellationToken,
    summarizer: Option<Summarizer>,
    reporter_output: ReporterOutput,
    worker: Option<JoinHandle<Result<(), StorageError>>>,
    reporter: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Validates `config` and loads every store under `layout`.
    pub fn open(
        layout: DataLayout,
        config: PipelineConfig,
        generator: Box<dyn Generator>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let stores = PipelineStores::open(&layout, config.error_log_capacity)?;
        let summarizer = Summarizer::new(generator, config.summarizer.clone())?;
        Ok(Self {
            layout,
            config,
            stores,
            stats: Arc::new(PipelineStats::new()),
            shutdown: CancellationToken::new(),
            summarizer: Some(summarizer),
            reporter_output: ReporterOutput::Stdout,
            worker: None,
            reporter: None,
        })
    }

    /// Sends stats reports to `out` instead of stdout.
    pub fn with_reporter_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.reporter_output = ReporterOutput::Custom(out);
        self
    }

    /// Runs without a stats reporter.
    pub fn without_reporter(mut self) -> Self {
        self.reporter_output = ReporterOutput::Disabled;
        self
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stores(&self) -> &PipelineStores {
        &self.stores
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Cancelling this token stops discovery, the worker and the reporter.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawns the queue worker and, unless disabled, the stats reporter.
    /// Calling it again is a no-op.
    pub fn start(&mut self) {
        let Some(summarizer) = self.summarizer.take() else {
            warn!("Pipeline already started");
            return;
        };

        let worker = QueueWorker::new(
            self.stores.clone(),
            self.stats.clone(),
            summarizer,
            self.config.worker.clone(),
            self.shutdown.clone(),
        );
        self.worker = Some(tokio::spawn(worker.run()));

        let output = std::mem::replace(&mut self.reporter_output, ReporterOutput::Disabled);
        let reporter = StatsReporter::new(
            self.stats.clone(),
            self.stores.queue.clone(),
            self.stores.errors.clone(),
            Duration::from_millis(self.config.stats.interval_ms.max(1)),
        )
        .clear_screen(self.config.stats.clear_screen)
        .recent_errors(self.config.stats.recent_errors);
        let reporter = match output {
            ReporterOutput::Stdout => Some(reporter),
            ReporterOutput::Custom(out) => Some(reporter.with_output(out)),
            ReporterOutput::Disabled => None,
        };
        self.reporter = reporter.map(|reporter| tokio::spawn(reporter.run(self.shutdown.clone())));
        info!("Pipeline started under '{}'", self.layout.root.display());
    }

    /// A discovery driver bound to this pipeline's stores and shutdown token.
    pub fn discovery(&self) -> DiscoveryDriver {
        DiscoveryDriver::new(
            self.stores.clone(),
            self.stats.clone(),
            self.config.discovery.clone(),
            self.shutdown.clone(),
        )
    }

    pub async fn run_discovery(
        &self,
        discoverer: &dyn Discoverer,
        seeds: &[String],
        iterations: u32,
    ) -> Result<DiscoveryReport, PipelineError> {
        self.discovery()
            .run_discovery(discoverer, seeds, iterations)
            .await
    }

    /// Waits until the queue is empty. Returns `false` if shutdown came
    /// first, including a shutdown triggered by a failed worker.
    pub async fn wait_until_drained(&self) -> bool {
        let poll = Duration::from_millis(self.config.worker.poll_interval_ms.max(1));
        loop {
            if self.stores.queue.is_empty() {
                return true;
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }

    /// Stops every background task and waits for them to finish. An entry
    /// being summarized stays queued for the next run.
    ///
    /// Returns the storage error that stopped the worker, if one did.
    pub async fn shutdown(mut self) -> Result<(), PipelineError> {
        self.shutdown.cancel();
        if let Some(reporter) = self.reporter.take() {
            if let Err(e) = reporter.await {
                warn!("Stats reporter ended abnormally: {e}");
            }
        }
        let worker_result = match self.worker.take() {
            Some(worker) => match worker.await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Queue worker ended abnormally: {e}");
                    Ok(())
                }
            },
            None => Ok(()),
        };
        info!(
            "Pipeline stopped with {} entries queued and {} processed",
            self.stores.queue.len(),
            self.stores.processed.len()
        );
        worker_result.map_err(PipelineError::from)
    }
}
