//! Link acquisition: scrape the source page once, then reuse the saved list.
//!
//! The first run extracts document URLs from the configured HTML page and
//! writes them to a newline-delimited cache file. Every later run reads that
//! file instead of hitting the source again, so reruns after a crash see the
//! exact same link list.

use async_trait::async_trait;
use reqwest::Url;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::HarvestConfig;
use crate::error::HarvestError;

/// Produces the ordered list of absolute document URLs.
#[async_trait]
pub trait LinkExtractor: Send + Sync {
    async fn extract_links(&self) -> Result<Vec<String>, HarvestError>;
}

/// Extracts anchors matching a CSS selector from one HTML page.
#[derive(Debug, Clone)]
pub struct HtmlLinkExtractor {
    client: reqwest::Client,
    source_url: String,
    selector: String,
}

impl HtmlLinkExtractor {
    pub fn new(source_url: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), source_url, selector)
    }

    pub fn with_client(
        client: reqwest::Client,
        source_url: impl Into<String>,
        selector: impl Into<String>,
    ) -> Self {
        Self {
            client,
            source_url: source_url.into(),
            selector: selector.into(),
        }
    }

    /// Extractor for the configured source page, bounded by the download
    /// timeout.
    pub fn from_config(config: &HarvestConfig) -> Result<Self, HarvestError> {
        Self::with_timeout(
            config.source_url.clone(),
            config.link_selector.clone(),
            config.download_timeout(),
        )
    }

    /// Build an extractor with a request timeout.
    pub fn with_timeout(
        source_url: impl Into<String>,
        selector: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, HarvestError> {
        let source_url = source_url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HarvestError::LinkExtraction {
                source_url: source_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self::with_client(client, source_url, selector))
    }

    fn failure(&self, reason: impl ToString) -> HarvestError {
        HarvestError::LinkExtraction {
            source_url: self.source_url.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl LinkExtractor for HtmlLinkExtractor {
    async fn extract_links(&self) -> Result<Vec<String>, HarvestError> {
        info!("Scraping document links from {}", self.source_url);

        let response = self
            .client
            .get(&self.source_url)
            .send()
            .await
            .map_err(|e| self.failure(e))?;
        if !response.status().is_success() {
            return Err(self.failure(format!("HTTP {}", response.status())));
        }
        let base = response.url().clone();
        let body = response.text().await.map_err(|e| self.failure(e))?;

        let links = select_links(&body, &self.selector, &base).map_err(|e| self.failure(e))?;
        info!("Scraped {} links", links.len());
        Ok(links)
    }
}

/// Select anchors from `html` and resolve their `href` against `base`.
///
/// Document order is preserved; repeated URLs keep their first position.
pub fn select_links(html: &str, selector: &str, base: &Url) -> Result<Vec<String>, String> {
    let selector =
        Selector::parse(selector).map_err(|e| format!("invalid selector '{selector}': {e}"))?;
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let links = document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| match base.join(href.trim()) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                debug!("Ignoring unresolvable href '{}': {}", href, e);
                None
            }
        })
        .filter(|url| seen.insert(url.clone()))
        .collect();
    Ok(links)
}

/// The file name a URL maps to: its last non-empty path segment.
pub fn url_basename(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let last = parsed.path_segments()?.next_back()?.trim();
    if last.is_empty() {
        None
    } else {
        Some(last.to_string())
    }
}

/// Newline-delimited link list persisted between runs.
#[derive(Debug, Clone)]
pub struct LinkCache {
    path: PathBuf,
}

impl LinkCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Read the cached links, trimming whitespace and skipping blank lines.
    pub async fn load(&self) -> Result<Vec<String>, HarvestError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| self.error(source))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn store(&self, links: &[String]) -> Result<(), HarvestError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.error(source))?;
        }
        tokio::fs::write(&self.path, links.join("\n"))
            .await
            .map_err(|source| self.error(source))
    }

    fn error(&self, source: std::io::Error) -> HarvestError {
        HarvestError::LinkCache {
            path: self.path.clone(),
            source,
        }
    }
}

/// Load links from `cache`, or extract them and populate the cache.
pub async fn acquire_links(
    cache: &LinkCache,
    extractor: &dyn LinkExtractor,
) -> Result<Vec<String>, HarvestError> {
    if cache.exists().await {
        info!("Links file found at {}, loading", cache.path().display());
        return cache.load().await;
    }

    let links = extractor.extract_links().await?;
    cache.store(&links).await?;
    debug!("Saved {} links to {}", links.len(), cache.path().display());
    Ok(links)
}
