use crate::errors::DiscoveryError;
use futures::stream::BoxStream;
use std::collections::BTreeMap;

/// One unit of source content found by a `Discoverer`.
///
/// `identifier` is the dedup key across runs: a URL for web pages, the item
/// link for feeds. `metadata` is written as `Key: value` header lines in
/// front of the content in the raw file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveredItem {
    pub identifier: String,
    pub content: String,
    pub metadata: BTreeMap<String, String>,
}

impl DiscoveredItem {
    pub fn new(identifier: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Adds a metadata header. Newlines in the value are flattened so each
    /// header stays on one line.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl AsRef<str>) -> Self {
        let value = value.as_ref().replace(['\r', '\n'], " ");
        self.metadata.insert(key.into(), value.trim().to_string());
        self
    }

    /// The raw file body: metadata headers, a blank line, then the content.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.metadata {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        if !self.metadata.is_empty() {
            out.push('\n');
        }
        out.push_str(&self.content);
        out
    }
}

/// A source plugin.
///
/// Any crate that provides a new kind of source (web pages, feeds, ...)
/// implements this trait so the discovery loop can drive every source the
/// same way.
pub trait Discoverer: Send + Sync {
    /// A short name for logs.
    fn name(&self) -> &str;

    /// Lazily yields items reachable from `seed`.
    ///
    /// The stream is pulled one item at a time, so the caller can pause
    /// between items without the source racing ahead. An `Err` item aborts
    /// the current seed only; the caller stops polling after the first one.
    fn discover<'a>(&'a self, seed: &'a str)
        -> BoxStream<'a, Result<DiscoveredItem, DiscoveryError>>;
}
