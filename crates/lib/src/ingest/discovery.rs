//! # Discovery Loop
//!
//! Drives a `Discoverer` over a list of seeds: skips identifiers that are
//! already processed or queued, writes raw content before enqueuing it, and
//! pauses while the queue is at its depth limit.

use super::traits::Discoverer;
use crate::{
    config::DiscoveryConfig,
    errors::{DiscoveryError, PipelineError},
    stats::PipelineStats,
    store::{EnqueueOutcome, PipelineStores, QueueEntry, Stage},
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What happened while discovering one seed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedReport {
    pub seed: String,
    /// Items the source yielded.
    pub yielded: usize,
    pub enqueued: usize,
    /// Items already processed or queued.
    pub skipped: usize,
    /// Items whose raw content could not be written.
    pub store_failures: usize,
}

/// Totals for a `run_discovery` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryReport {
    pub seeds: Vec<SeedReport>,
    /// Seeds whose source failed before finishing.
    pub failed_seeds: usize,
    /// Set when shutdown stopped discovery early.
    pub interrupted: bool,
}

impl DiscoveryReport {
    pub fn enqueued(&self) -> usize {
        self.seeds.iter().map(|s| s.enqueued).sum()
    }

    pub fn skipped(&self) -> usize {
        self.seeds.iter().map(|s| s.skipped).sum()
    }
}

/// Feeds discovered items into the queue.
#[derive(Debug, Clone)]
pub struct DiscoveryDriver {
    stores: PipelineStores,
    stats: Arc<PipelineStats>,
    config: DiscoveryConfig,
    shutdown: CancellationToken,
}

impl DiscoveryDriver {
    pub fn new(
        stores: PipelineStores,
        stats: Arc<PipelineStats>,
        config: DiscoveryConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            stores,
            stats,
            config,
            shutdown,
        }
    }

    /// Runs every seed through `discoverer`, `iterations` times over.
    ///
    /// A source failure is recorded against the seed and the next seed
    /// starts. Storage failures on the queue are fatal: continuing would let
    /// the queue file drift from what the worker sees.
    pub async fn run_discovery(
        &self,
        discoverer: &dyn Discoverer,
        seeds: &[String],
        iterations: u32,
    ) -> Result<DiscoveryReport, PipelineError> {
        let mut report = DiscoveryReport::default();
        for iteration in 1..=iterations {
            self.stats.set_iteration(u64::from(iteration));
            info!(
                "Starting {} discovery iteration {iteration}/{iterations} over {} seeds",
                discoverer.name(),
                seeds.len()
            );
            for seed in seeds {
                if self.shutdown.is_cancelled() {
                    report.interrupted = true;
                    return Ok(report);
                }
                match self.discover_seed(discoverer, seed).await {
                    Ok(seed_report) => {
                        info!(
                            "Seed '{seed}': {} yielded, {} enqueued, {} skipped",
                            seed_report.yielded, seed_report.enqueued, seed_report.skipped
                        );
                        report.seeds.push(seed_report);
                    }
                    Err(PipelineError::Discovery(DiscoveryError::Interrupted)) => {
                        report.interrupted = true;
                        return Ok(report);
                    }
                    Err(PipelineError::Discovery(e)) => {
                        warn!("Discovery failed for seed '{seed}': {e}");
                        self.stores
                            .errors
                            .record(seed, Stage::Discover, e.to_string());
                        self.stats.record_error();
                        report.failed_seeds += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(report)
    }

    /// Pulls every item reachable from `seed` into the queue.
    ///
    /// Returns the source's error if it fails; items enqueued before the
    /// failure stay queued.
    pub async fn discover_seed(
        &self,
        discoverer: &dyn Discoverer,
        seed: &str,
    ) -> Result<SeedReport, PipelineError> {
        let mut report = SeedReport {
            seed: seed.to_string(),
            ..Default::default()
        };
        let mut items = discoverer.discover(seed);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Err(DiscoveryError::Interrupted.into()),
                next = items.next() => next,
            };
            let Some(item) = next else { break };
            let item = item?;
            report.yielded += 1;

            let id = item.identifier.as_str();
            // Abandoned items never reach `processed`; a later pass queues
            // them again with a fresh retry budget.
            if self.stores.processed.contains(id) || self.stores.queue.contains(id) {
                debug!("Skipping known item '{id}'");
                report.skipped += 1;
                self.stats.record_skipped();
                continue;
            }

            self.wait_for_capacity().await?;

            let raw_path = match self.stores.content.write_raw(id, &item.render()) {
                Ok(path) => path,
                Err(e) => {
                    warn!("Could not store content for '{id}': {e}");
                    self.stores.errors.record(id, Stage::Store, e.to_string());
                    self.stats.record_error();
                    report.store_failures += 1;
                    continue;
                }
            };

            match self.stores.queue.enqueue(QueueEntry::new(id, raw_path))? {
                EnqueueOutcome::Enqueued => {
                    debug!("Enqueued '{id}'");
                    report.enqueued += 1;
                    self.stats.record_discovered();
                }
                EnqueueOutcome::AlreadyQueued | EnqueueOutcome::AlreadyProcessed => {
                    report.skipped += 1;
                    self.stats.record_skipped();
                }
            }
        }
        Ok(report)
    }

    /// Blocks while the queue is at `max_queue_depth`.
    async fn wait_for_capacity(&self) -> Result<(), DiscoveryError> {
        let poll = Duration::from_millis(self.config.backpressure_poll_ms.max(1));
        let mut logged = false;
        while self.stores.queue.len() >= self.config.max_queue_depth {
            if !logged {
                info!(
                    "Queue holds {} entries; pausing discovery",
                    self.config.max_queue_depth
                );
                logged = true;
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(DiscoveryError::Interrupted),
                _ = tokio::time::sleep(poll) => {}
            }
        }
        if logged {
            debug!("Queue has room again; resuming discovery");
        }
        Ok(())
    }
}
