//! # Default Prompt Templates
//!
//! Prompts used by the `Summarizer`. Both can be overridden through
//! `SummarizerConfig`.

/// The default system prompt for summarizing one chunk of source text.
pub const SUMMARIZATION_SYSTEM_PROMPT: &str = "You are an assistant that summarizes source material. Be as concise as possible while keeping every fact, name and number that matters. Do not add commentary or introductions.";

/// The default user prompt for summarizing one chunk of source text.
///
/// Placeholders: `{text}`
pub const SUMMARIZATION_USER_PROMPT: &str = "Source text:\n{text}\n\nSummary:";

/// The system prompt for a reduction round, where the input is itself a set
/// of partial summaries.
pub const REDUCTION_SYSTEM_PROMPT: &str = "You are an assistant that merges partial summaries of one source into a single summary. Remove repetition, keep every distinct fact, and be as concise as possible. Do not add commentary or introductions.";

/// Placeholders: `{text}`
pub const REDUCTION_USER_PROMPT: &str = "Partial summaries:\n{text}\n\nMerged summary:";
