//! # Summarization
//!
//! Summarizes chunked text through a `Generator`. Each chunk is summarized
//! independently with bounded, jittered retries; the partial summaries are
//! merged and, while the merge is still larger than the context window,
//! re-split and summarized again for a bounded number of rounds.

use crate::{
    chunk::split_into_windows,
    config::SummarizerConfig,
    errors::{ConfigError, EndpointError, SummarizationError},
    prompts::{
        REDUCTION_SYSTEM_PROMPT, REDUCTION_USER_PROMPT, SUMMARIZATION_SYSTEM_PROMPT,
        SUMMARIZATION_USER_PROMPT,
    },
    providers::ai::Generator,
};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Round {
    /// Summarizing source chunks.
    Map,
    /// Merging partial summaries.
    Reduce,
}

#[derive(Debug)]
pub struct Summarizer {
    generator: Box<dyn Generator>,
    config: SummarizerConfig,
}

impl Summarizer {
    /// Creates a summarizer. Fails if the window settings cannot make
    /// progress.
    pub fn new(
        generator: Box<dyn Generator>,
        config: SummarizerConfig,
    ) -> Result<Self, ConfigError> {
        if config.overlap >= config.window_size {
            return Err(ConfigError::InvalidWindow {
                window_size: config.window_size,
                overlap: config.overlap,
            });
        }
        Ok(Self { generator, config })
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Splits source text with the configured window and overlap.
    pub fn split(&self, text: &str) -> Result<Vec<String>, ConfigError> {
        split_into_windows(text, self.config.window_size, self.config.overlap)
    }

    /// Produces one summary for all `chunks`.
    ///
    /// Any chunk that still fails after the retry bound fails the whole call.
    pub async fn summarize(&self, chunks: &[String]) -> Result<String, SummarizationError> {
        if chunks.iter().all(|chunk| chunk.trim().is_empty()) {
            return Err(SummarizationError::EmptyInput);
        }

        let mut merged = self.summarize_round(chunks, Round::Map).await?;
        let mut depth = 0;
        while merged.chars().count() > self.config.context_window {
            if depth >= self.config.max_reduction_depth {
                return Err(SummarizationError::Oversized {
                    depth,
                    len: merged.chars().count(),
                });
            }
            depth += 1;
            let windows = self.split(&merged)?;
            info!(
                "Merged summary exceeds {} characters; reduction round {depth} over {} windows",
                self.config.context_window,
                windows.len()
            );
            merged = self.summarize_round(&windows, Round::Reduce).await?;
        }
        Ok(merged)
    }

    async fn summarize_round(
        &self,
        chunks: &[String],
        round: Round,
    ) -> Result<String, SummarizationError> {
        let mut partials = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            if chunk.trim().is_empty() {
                continue;
            }
            partials.push(self.summarize_chunk(index, chunk, round).await?);
        }
        Ok(partials.join("\n\n"))
    }

    async fn summarize_chunk(
        &self,
        index: usize,
        chunk: &str,
        round: Round,
    ) -> Result<String, SummarizationError> {
        let (system_prompt, user_template) = match round {
            Round::Map => (
                self.config
                    .system_prompt
                    .as_deref()
                    .unwrap_or(SUMMARIZATION_SYSTEM_PROMPT),
                self.config
                    .user_prompt
                    .as_deref()
                    .unwrap_or(SUMMARIZATION_USER_PROMPT),
            ),
            Round::Reduce => (REDUCTION_SYSTEM_PROMPT, REDUCTION_USER_PROMPT),
        };
        let user_prompt = user_template.replace("{text}", chunk);
        let timeout = self.config.request_timeout();

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(chunk = index, attempt, "--> Sending chunk to generator");
            let error = match tokio::time::timeout(
                timeout,
                self.generator.generate(system_prompt, &user_prompt),
            )
            .await
            {
                Ok(Ok(text)) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
                Ok(Ok(_)) => EndpointError::EmptyResponse,
                Ok(Err(e)) => e,
                Err(_) => EndpointError::Timeout(timeout),
            };

            if attempt >= self.config.max_attempts {
                return Err(SummarizationError::Chunk {
                    index,
                    attempts: attempt,
                    source: error,
                });
            }
            let delay = self.backoff_delay(attempt);
            warn!(
                chunk = index,
                attempt,
                "Generation failed ({error}); retrying in {delay:?}"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Exponential backoff capped at `backoff_max_ms`, plus uniform jitter.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .config
            .backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.config.backoff_max_ms);
        let jitter = if self.config.backoff_jitter_ms > 0 {
            rand::thread_rng().gen_range(0..self.config.backoff_jitter_ms)
        } else {
            0
        };
        Duration::from_millis(base + jitter)
    }
}
