//! # Progress Statistics
//!
//! Shared counters written by discovery and the queue worker, and a reporter
//! task that renders them on an interval. Counters are relaxed atomics: a
//! snapshot may be slightly stale or torn across fields, which is fine for a
//! diagnostic display.

use crate::store::{DurableQueue, ErrorLog, ErrorRecord};
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
pub struct PipelineStats {
    started: Instant,
    discovered: AtomicU64,
    skipped: AtomicU64,
    entries_succeeded: AtomicU64,
    entries_failed: AtomicU64,
    entries_abandoned: AtomicU64,
    entry_time_micros: AtomicU64,
    entries_timed: AtomicU64,
    summary_time_micros: AtomicU64,
    errors: AtomicU64,
    iteration: AtomicU64,
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            discovered: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            entries_succeeded: AtomicU64::new(0),
            entries_failed: AtomicU64::new(0),
            entries_abandoned: AtomicU64::new(0),
            entry_time_micros: AtomicU64::new(0),
            entries_timed: AtomicU64::new(0),
            summary_time_micros: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            iteration: AtomicU64::new(0),
        }
    }

    /// A new item was written and queued.
    pub fn record_discovered(&self) {
        self.discovered.fetch_add(1, Ordering::Relaxed);
    }

    /// An item was skipped because it was already processed or queued.
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// A summary was written; `summary_time` covers the summarizer call only.
    pub fn record_success(&self, summary_time: Duration) {
        self.entries_succeeded.fetch_add(1, Ordering::Relaxed);
        self.summary_time_micros
            .fetch_add(summary_time.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, abandoned: bool) {
        self.entries_failed.fetch_add(1, Ordering::Relaxed);
        if abandoned {
            self.entries_abandoned.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Wall time spent on one queue entry, whatever the outcome.
    pub fn record_entry_time(&self, elapsed: Duration) {
        self.entries_timed.fetch_add(1, Ordering::Relaxed);
        self.entry_time_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_iteration(&self, iteration: u64) {
        self.iteration.store(iteration, Ordering::Relaxed);
    }

    pub fn snapshot(&self, queue_size: usize) -> StatsSnapshot {
        let succeeded = self.entries_succeeded.load(Ordering::Relaxed);
        let timed = self.entries_timed.load(Ordering::Relaxed);
        StatsSnapshot {
            queue_size,
            discovered: self.discovered.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            summaries: succeeded,
            failures: self.entries_failed.load(Ordering::Relaxed),
            abandoned: self.entries_abandoned.load(Ordering::Relaxed),
            avg_summary_time: average(self.summary_time_micros.load(Ordering::Relaxed), succeeded),
            avg_entry_time: average(self.entry_time_micros.load(Ordering::Relaxed), timed),
            errors: self.errors.load(Ordering::Relaxed),
            iteration: self.iteration.load(Ordering::Relaxed),
            runtime: self.started.elapsed(),
        }
    }
}

fn average(total_micros: u64, count: u64) -> Duration {
    if count == 0 {
        Duration::ZERO
    } else {
        Duration::from_micros(total_micros / count)
    }
}

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub queue_size: usize,
    pub discovered: u64,
    pub skipped: u64,
    pub summaries: u64,
    pub failures: u64,
    pub abandoned: u64,
    pub avg_summary_time: Duration,
    pub avg_entry_time: Duration,
    pub errors: u64,
    pub iteration: u64,
    pub runtime: Duration,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Queue Size: {}", self.queue_size)?;
        writeln!(
            f,
            "Average Time per Queue Entry: {:.2}s",
            self.avg_entry_time.as_secs_f64()
        )?;
        writeln!(f, "Total Items Discovered: {}", self.discovered)?;
        writeln!(f, "Already Known (skipped): {}", self.skipped)?;
        writeln!(f, "Total Summaries Created: {}", self.summaries)?;
        writeln!(
            f,
            "Average Time per Summary: {:.2}s",
            self.avg_summary_time.as_secs_f64()
        )?;
        writeln!(
            f,
            "Failed Attempts: {} ({} abandoned)",
            self.failures, self.abandoned
        )?;
        writeln!(f, "Errors Recorded: {}", self.errors)?;
        writeln!(f, "Total Runtime: {:.2}s", self.runtime.as_secs_f64())?;
        write!(f, "Iteration Number: {}", self.iteration)
    }
}

/// Renders the console view: recent errors, a rule, then the counters.
pub fn render_report(snapshot: &StatsSnapshot, recent_errors: &[ErrorRecord]) -> String {
    let mut out = String::new();
    for record in recent_errors {
        out.push_str(&record.to_string());
        out.push('\n');
    }
    out.push_str(&"-".repeat(50));
    out.push('\n');
    out.push_str(&snapshot.to_string());
    out.push('\n');
    out
}

/// Periodically writes a stats report.
pub struct StatsReporter {
    stats: Arc<PipelineStats>,
    queue: Arc<DurableQueue>,
    errors: Arc<ErrorLog>,
    interval: Duration,
    clear_screen: bool,
    recent_errors: usize,
    out: Box<dyn Write + Send>,
}

impl StatsReporter {
    pub fn new(
        stats: Arc<PipelineStats>,
        queue: Arc<DurableQueue>,
        errors: Arc<ErrorLog>,
        interval: Duration,
    ) -> Self {
        Self {
            stats,
            queue,
            errors,
            interval,
            clear_screen: false,
            recent_errors: 5,
            out: Box::new(std::io::stdout()),
        }
    }

    pub fn clear_screen(mut self, clear_screen: bool) -> Self {
        self.clear_screen = clear_screen;
        self
    }

    pub fn recent_errors(mut self, recent_errors: usize) -> Self {
        self.recent_errors = recent_errors;
        self
    }

    /// Sends reports somewhere other than stdout.
    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    /// Builds the current report without waiting on any store lock.
    pub fn report(&self) -> String {
        let snapshot = self.stats.snapshot(self.queue.approx_len());
        let recent = self
            .errors
            .try_recent(self.recent_errors)
            .unwrap_or_default();
        render_report(&snapshot, &recent)
    }

    /// Writes a report every interval until `shutdown` is cancelled, then
    /// writes a final one.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.emit(),
            }
        }
        self.emit();
        debug!("Stats reporter stopped");
    }

    fn emit(&mut self) {
        let report = self.report();
        let clear = if self.clear_screen { "\x1bc" } else { "" };
        // Diagnostics only: a failed console write is not worth stopping for.
        let _ = write!(self.out, "{clear}{report}");
        let _ = self.out.flush();
    }
}
