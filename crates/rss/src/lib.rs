//! # `distill-rss`: Feed Discovery Plugin
//!
//! Fetches an RSS channel and yields one `DiscoveredItem` per entry. It
//! implements the `Discoverer` trait from the core `distill` library.

use distill::errors::DiscoveryError;
use distill::ingest::{DiscoveredItem, Discoverer};
use distill_html::html_to_text;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use rss::Channel;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Custom error types for the feed discovery process.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("Failed to fetch RSS feed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("Failed to parse RSS feed: {0}")]
    Parse(#[from] rss::Error),
}

/// A helper to convert the specific `FeedError` into the generic `DiscoveryError`.
impl From<FeedError> for DiscoveryError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Client(e) | FeedError::Fetch(e) => DiscoveryError::Fetch(e.to_string()),
            FeedError::Parse(e) => DiscoveryError::Parse(e.to_string()),
        }
    }
}

/// The `Discoverer` implementation for RSS feeds. Seeds are feed URLs.
#[derive(Debug, Clone)]
pub struct FeedDiscoverer {
    client: reqwest::Client,
}

impl FeedDiscoverer {
    /// Creates a new `FeedDiscoverer` whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FeedError::Client)?;
        Ok(Self { client })
    }

    /// Fetches and parses the channel at `feed_url`.
    pub async fn fetch_channel(&self, feed_url: &str) -> Result<Channel, FeedError> {
        info!("Fetching RSS feed from: {}", feed_url);
        let content = self
            .client
            .get(feed_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(Channel::read_from(&content[..])?)
    }
}

/// Builds one item per channel entry that has a link. The link is the
/// identifier; entries without one cannot be deduplicated and are dropped.
pub fn items_from_channel(channel: &Channel) -> Vec<DiscoveredItem> {
    let mut items = Vec::new();
    for entry in channel.items() {
        let Some(link) = entry.link().map(str::trim).filter(|l| !l.is_empty()) else {
            debug!("Skipping feed entry without a link");
            continue;
        };
        let title = entry.title().unwrap_or_default().trim();

        let mut sections = Vec::new();
        if !title.is_empty() {
            sections.push(title.to_string());
        }
        for html in [entry.description(), entry.content()].into_iter().flatten() {
            let text = html_to_text(html);
            if !text.is_empty() {
                sections.push(text);
            }
        }

        let mut item = DiscoveredItem::new(link, sections.join("\n\n")).with_metadata("URL", link);
        if !title.is_empty() {
            item = item.with_metadata("Title", title);
        }
        items.push(item);
    }
    items
}

impl Discoverer for FeedDiscoverer {
    fn name(&self) -> &str {
        "rss"
    }

    fn discover<'a>(
        &'a self,
        seed: &'a str,
    ) -> BoxStream<'a, Result<DiscoveredItem, DiscoveryError>> {
        stream::once(async move {
            let channel = self.fetch_channel(seed.trim()).await?;
            let items = items_from_channel(&channel);
            info!("Feed {seed} lists {} items", items.len());
            Ok::<_, DiscoveryError>(stream::iter(items.into_iter().map(Ok)))
        })
        .try_flatten()
        .boxed()
    }
}
