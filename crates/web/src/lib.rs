//! # distill-web: Web Crawler Plugin
//!
//! Crawls a site breadth-first from a seed URL and yields each page's text
//! as a `DiscoveredItem`. Implements the `Discoverer` trait.

use distill::{
    errors::DiscoveryError,
    ingest::{DiscoveredItem, Discoverer},
};
use distill_html::{extract_links, html_to_text, normalize_url, page_title};
use futures::stream::{self, BoxStream, StreamExt};
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

// --- Error Definitions ---

#[derive(Error, Debug)]
pub enum WebCrawlError {
    #[error("Invalid seed URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Invalid strip pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Fetching {url} returned status {status}")]
    Status { url: String, status: u16 },
}

impl From<WebCrawlError> for DiscoveryError {
    fn from(err: WebCrawlError) -> Self {
        match err {
            WebCrawlError::InvalidUrl { .. } => DiscoveryError::InvalidSeed(err.to_string()),
            WebCrawlError::Fetch { .. } | WebCrawlError::Status { .. } => {
                DiscoveryError::Fetch(err.to_string())
            }
            WebCrawlError::InvalidPattern { .. } | WebCrawlError::Client(_) => {
                DiscoveryError::Parse(err.to_string())
            }
        }
    }
}

// --- Configuration ---

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CrawlConfig {
    /// Pages fetched per seed, the seed included.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Pause between consecutive fetches.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Links with any of these path segments are not followed.
    #[serde(default)]
    pub unwanted_segments: Vec<String>,
    /// Regexes whose matches are removed from page text (navigation
    /// boilerplate, language pickers).
    #[serde(default)]
    pub strip_patterns: Vec<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_max_pages() -> usize {
    100
}
fn default_request_delay_ms() -> u64 {
    1_000
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_user_agent() -> String {
    concat!("distill/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            request_delay_ms: default_request_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            unwanted_segments: Vec::new(),
            strip_patterns: Vec::new(),
            user_agent: default_user_agent(),
        }
    }
}

// --- Crawler ---

#[derive(Debug, Clone)]
pub struct WebCrawler {
    client: reqwest::Client,
    config: CrawlConfig,
    strip: Vec<Regex>,
}

/// Per-seed crawl state threaded through the stream.
struct CrawlState {
    seed: Option<Url>,
    frontier: VecDeque<Url>,
    seen: HashSet<Url>,
    fetched: usize,
    pending_error: Option<DiscoveryError>,
    done: bool,
}

impl WebCrawler {
    pub fn new(config: CrawlConfig) -> Result<Self, WebCrawlError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(WebCrawlError::Client)?;
        let strip = config
            .strip_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| WebCrawlError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            client,
            config,
            strip,
        })
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Fetches one page. Non-2xx responses are errors.
    pub async fn fetch_page(&self, url: &Url) -> Result<String, WebCrawlError> {
        let fetch_err = |source| WebCrawlError::Fetch {
            url: url.to_string(),
            source,
        };
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(fetch_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(WebCrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(fetch_err)
    }

    /// Whether a link found while crawling from `seed` should be visited.
    pub fn should_follow(&self, seed: &Url, link: &Url) -> bool {
        if link.host_str() != seed.host_str()
            || link.port_or_known_default() != seed.port_or_known_default()
        {
            return false;
        }
        let unwanted = link.path_segments().is_some_and(|mut segments| {
            segments.any(|segment| self.config.unwanted_segments.iter().any(|u| u == segment))
        });
        !unwanted
    }

    fn page_text(&self, html: &str) -> String {
        let mut text = html_to_text(html);
        for re in &self.strip {
            text = re.replace_all(&text, "").into_owned();
        }
        text.trim().to_string()
    }

    fn start(&self, seed: &str) -> CrawlState {
        let mut state = CrawlState {
            seed: None,
            frontier: VecDeque::new(),
            seen: HashSet::new(),
            fetched: 0,
            pending_error: None,
            done: false,
        };
        match Url::parse(seed.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                let url = normalize_url(&url);
                state.seen.insert(url.clone());
                state.frontier.push_back(url.clone());
                state.seed = Some(url);
            }
            Ok(url) => {
                state.pending_error = Some(
                    WebCrawlError::InvalidUrl {
                        url: seed.to_string(),
                        reason: format!("unsupported scheme '{}'", url.scheme()),
                    }
                    .into(),
                );
            }
            Err(e) => {
                state.pending_error = Some(
                    WebCrawlError::InvalidUrl {
                        url: seed.to_string(),
                        reason: e.to_string(),
                    }
                    .into(),
                );
            }
        }
        state
    }

    /// Advances the crawl by one yielded item.
    async fn next_item(
        &self,
        state: &mut CrawlState,
    ) -> Option<Result<DiscoveredItem, DiscoveryError>> {
        if let Some(error) = state.pending_error.take() {
            state.done = true;
            return Some(Err(error));
        }
        let seed = state.seed.clone()?;
        while !state.done && state.fetched < self.config.max_pages {
            let url = state.frontier.pop_front()?;
            if state.fetched > 0 && self.config.request_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.request_delay_ms)).await;
            }
            let is_seed = state.fetched == 0;
            state.fetched += 1;
            debug!("Fetching {url}");

            let html = match self.fetch_page(&url).await {
                Ok(html) => html,
                Err(e) if is_seed => {
                    state.done = true;
                    return Some(Err(e.into()));
                }
                Err(e) => {
                    warn!("Skipping page: {e}");
                    continue;
                }
            };

            for link in extract_links(&html, &url) {
                if self.should_follow(&seed, &link) && state.seen.insert(link.clone()) {
                    state.frontier.push_back(link);
                }
            }

            let text = self.page_text(&html);
            if text.is_empty() {
                debug!("No text on {url}; not yielding it");
                continue;
            }
            let mut item =
                DiscoveredItem::new(url.as_str(), text).with_metadata("URL", url.as_str());
            if let Some(title) = page_title(&html) {
                item = item.with_metadata("Title", title);
            }
            return Some(Ok(item));
        }
        if !state.done {
            info!("Crawl of {seed} finished after {} pages", state.fetched);
            state.done = true;
        }
        None
    }
}

impl Discoverer for WebCrawler {
    fn name(&self) -> &str {
        "web"
    }

    fn discover<'a>(
        &'a self,
        seed: &'a str,
    ) -> BoxStream<'a, Result<DiscoveredItem, DiscoveryError>> {
        info!("Crawling from {seed} (max {} pages)", self.config.max_pages);
        stream::unfold(self.start(seed), move |mut state| async move {
            if state.done {
                return None;
            }
            self.next_item(&mut state)
                .await
                .map(|item| (item, state))
        })
        .boxed()
    }
}
