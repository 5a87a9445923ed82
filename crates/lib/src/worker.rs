//! # Queue Worker
//!
//! Takes entries off the head of the queue one at a time, summarizes their
//! raw content and records the result. Failed entries go back to the tail
//! until they reach the retry ceiling.

use crate::{
    config::WorkerConfig,
    errors::StorageError,
    stats::PipelineStats,
    store::{PipelineStores, QueueEntry, Stage},
    summarize::Summarizer,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The result of one `process_next` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Nothing was waiting.
    Idle,
    Succeeded { identifier: String },
    /// The entry failed and went back to the tail.
    Requeued { identifier: String, attempt: u32 },
    /// The entry failed past the retry ceiling and was dropped.
    Abandoned { identifier: String },
    /// Shutdown arrived mid-entry; the entry stays queued.
    Interrupted { identifier: String },
}

pub struct QueueWorker {
    stores: PipelineStores,
    stats: Arc<PipelineStats>,
    summarizer: Summarizer,
    config: WorkerConfig,
    shutdown: CancellationToken,
}

impl QueueWorker {
    pub fn new(
        stores: PipelineStores,
        stats: Arc<PipelineStats>,
        summarizer: Summarizer,
        config: WorkerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            stores,
            stats,
            summarizer,
            config,
            shutdown,
        }
    }

    /// Processes entries until `shutdown` is cancelled.
    ///
    /// A failed queue write stops the worker: it cancels `shutdown` so the
    /// rest of the pipeline stops too, and returns the error.
    pub async fn run(self) -> Result<(), StorageError> {
        let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
        info!("Queue worker started");
        while !self.shutdown.is_cancelled() {
            match self.process_next().await {
                Ok(WorkOutcome::Idle) => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(poll) => {}
                    }
                }
                Ok(WorkOutcome::Interrupted { identifier }) => {
                    info!("Left '{identifier}' queued for the next run");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Queue update failed; stopping the worker: {e}");
                    self.shutdown.cancel();
                    return Err(e);
                }
            }
        }
        info!("Queue worker stopped");
        Ok(())
    }

    /// Claims and processes the oldest entry, if any.
    ///
    /// Only queue persistence failures are returned as errors; everything
    /// else is recorded in the error log and reflected in the outcome.
    pub async fn process_next(&self) -> Result<WorkOutcome, StorageError> {
        let Some(entry) = self.stores.queue.claim_next() else {
            return Ok(WorkOutcome::Idle);
        };
        let started = Instant::now();
        let outcome = self.process_entry(&entry).await;
        if outcome.is_err() {
            self.stores.queue.release(&entry.identifier);
        }
        self.stats.record_entry_time(started.elapsed());
        outcome
    }

    async fn process_entry(&self, entry: &QueueEntry) -> Result<WorkOutcome, StorageError> {
        let id = entry.identifier.as_str();

        // Left behind by a crash between marking it processed and removing it.
        if self.stores.processed.contains(id) {
            debug!("'{id}' is already processed; dropping its queue entry");
            self.stores.queue.remove(id)?;
            return Ok(WorkOutcome::Succeeded {
                identifier: id.to_string(),
            });
        }

        let text = match self.stores.content.read_raw(&entry.source_content_path) {
            Ok(text) => text,
            Err(e) => return self.fail(entry, Stage::Load, e.to_string()),
        };
        let chunks = match self.summarizer.split(&text) {
            Ok(chunks) => chunks,
            Err(e) => return self.fail(entry, Stage::Summarize, e.to_string()),
        };

        debug!("Summarizing '{id}' ({} chunks)", chunks.len());
        let summary_started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                self.stores.queue.release(id);
                return Ok(WorkOutcome::Interrupted { identifier: id.to_string() });
            }
            result = self.summarizer.summarize(&chunks) => result,
        };
        let summary_time = summary_started.elapsed();
        let summary = match result {
            Ok(summary) => summary,
            Err(e) => return self.fail(entry, Stage::Summarize, e.to_string()),
        };

        if let Err(e) = self.stores.content.write_summary(id, &summary) {
            return self.fail(entry, Stage::Persist, e.to_string());
        }
        if let Err(e) = self.stores.processed.add(id) {
            return self.fail(entry, Stage::Persist, e.to_string());
        }
        self.stores.queue.remove(id)?;
        self.stats.record_success(summary_time);
        info!("Summarized '{id}' in {:.2}s", summary_time.as_secs_f64());
        Ok(WorkOutcome::Succeeded {
            identifier: id.to_string(),
        })
    }

    /// Records a failure and either requeues the entry or, once it has used
    /// up its retries, drops it with a final `abandoned` record.
    fn fail(
        &self,
        entry: &QueueEntry,
        stage: Stage,
        message: String,
    ) -> Result<WorkOutcome, StorageError> {
        let id = entry.identifier.as_str();
        self.stats.record_error();

        if entry.attempt < self.config.retry_ceiling {
            warn!("Processing '{id}' failed at {stage}: {message}");
            self.stores.errors.record(id, stage, message);
            let attempt = self
                .stores
                .queue
                .requeue(id)?
                .unwrap_or(entry.attempt + 1);
            self.stats.record_failure(false);
            return Ok(WorkOutcome::Requeued {
                identifier: id.to_string(),
                attempt,
            });
        }

        let attempts = entry.attempt + 1;
        warn!("Abandoning '{id}' after {attempts} attempts; last failure at {stage}: {message}");
        self.stores.errors.record(
            id,
            Stage::Abandoned,
            format!("gave up after {attempts} attempts; {stage}: {message}"),
        );
        self.stores.queue.remove(id)?;
        self.stats.record_failure(true);
        Ok(WorkOutcome::Abandoned {
            identifier: id.to_string(),
        })
    }
}
