//! Configuration for a harvest run.
//!
//! All behaviour is controlled through [`HarvestConfig`], built via its
//! [`HarvestConfigBuilder`]. The four storage locations have no defaults:
//! a run that does not know where its catalog, files, images and link cache
//! live fails at startup rather than writing somewhere surprising.

use crate::download::RetryPolicy;
use crate::error::HarvestError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default page listing the JFK 2025 release documents.
pub const DEFAULT_SOURCE_URL: &str = "https://www.archives.gov/research/jfk/release-2025";

/// Default CSS selector for document anchors on [`DEFAULT_SOURCE_URL`].
pub const DEFAULT_LINK_SELECTOR: &str = "table.datatable td > a";

/// Environment variable names, shared with the CLI flags.
pub mod env {
    pub const DATABASE_PATH: &str = "SQLITE_PATH";
    pub const FILES_DIR: &str = "FILES_DIR";
    pub const IMAGES_DIR: &str = "IMAGES_DIR";
    pub const LINKS_CACHE_PATH: &str = "LINKS_TEXT_PATH";
    pub const SOURCE_URL: &str = "HARVEST_SOURCE_URL";
    pub const LINK_SELECTOR: &str = "HARVEST_LINK_SELECTOR";
    pub const BATCH_SIZE: &str = "HARVEST_BATCH_SIZE";
    pub const DOWNLOAD_TIMEOUT: &str = "HARVEST_DOWNLOAD_TIMEOUT";
    pub const WORKERS: &str = "HARVEST_WORKERS";
    pub const DPI: &str = "HARVEST_DPI";
}

/// Configuration for a harvest run.
///
/// # Example
/// ```rust
/// use pdf_harvest::HarvestConfig;
///
/// let config = HarvestConfig::builder()
///     .database_path("data/catalog.sqlite")
///     .files_dir("data/files")
///     .images_dir("data/images")
///     .links_cache_path("data/links.txt")
///     .batch_size(8)
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 8);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct HarvestConfig {
    /// SQLite catalog file.
    pub database_path: PathBuf,

    /// Directory holding downloaded documents, one file per URL basename.
    pub files_dir: PathBuf,

    /// Directory holding rendered pages, one subdirectory per document.
    pub images_dir: PathBuf,

    /// Newline-delimited cache of extracted links.
    pub links_cache_path: PathBuf,

    /// Page the link extractor scrapes when the cache is absent.
    pub source_url: String,

    /// CSS selector matching the document anchors on `source_url`.
    pub link_selector: String,

    /// Downloads issued concurrently per batch. Default: 4.
    pub batch_size: usize,

    /// Retry budget and backoff for a single download.
    pub retry: RetryPolicy,

    /// Timeout for a single download attempt in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Size of the rendering worker pool. Default: available parallelism.
    pub workers: usize,

    /// Rendering DPI. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// Longest rendered edge in pixels, regardless of DPI. Default: 6000.
    pub max_rendered_pixels: u32,
}

impl HarvestConfig {
    /// Create a new builder for `HarvestConfig`.
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder::default()
    }

    /// Build a configuration from the process environment.
    ///
    /// Unparseable optional values are reported as
    /// [`HarvestError::InvalidConfig`]; absent ones fall back to defaults.
    pub fn from_env() -> Result<Self, HarvestError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HarvestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut builder = HarvestConfig::builder();
        if let Some(v) = lookup(env::DATABASE_PATH) {
            builder = builder.database_path(v);
        }
        if let Some(v) = lookup(env::FILES_DIR) {
            builder = builder.files_dir(v);
        }
        if let Some(v) = lookup(env::IMAGES_DIR) {
            builder = builder.images_dir(v);
        }
        if let Some(v) = lookup(env::LINKS_CACHE_PATH) {
            builder = builder.links_cache_path(v);
        }
        if let Some(v) = lookup(env::SOURCE_URL) {
            builder = builder.source_url(v);
        }
        if let Some(v) = lookup(env::LINK_SELECTOR) {
            builder = builder.link_selector(v);
        }
        if let Some(v) = lookup(env::BATCH_SIZE) {
            builder = builder.batch_size(parse_number(env::BATCH_SIZE, &v)?);
        }
        if let Some(v) = lookup(env::DOWNLOAD_TIMEOUT) {
            builder = builder.download_timeout_secs(parse_number(env::DOWNLOAD_TIMEOUT, &v)?);
        }
        if let Some(v) = lookup(env::WORKERS) {
            builder = builder.workers(parse_number(env::WORKERS, &v)?);
        }
        if let Some(v) = lookup(env::DPI) {
            builder = builder.dpi(parse_number(env::DPI, &v)?);
        }
        builder.build()
    }

    /// Per-attempt download timeout.
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Local path of a downloaded document.
    pub fn document_path(&self, name: &str) -> PathBuf {
        self.files_dir.join(name)
    }

    /// Create the files and images directories if they are missing.
    pub fn ensure_dirs(&self) -> Result<(), HarvestError> {
        for dir in [&self.files_dir, &self.images_dir] {
            std::fs::create_dir_all(dir).map_err(|source| HarvestError::Directory {
                path: dir.clone(),
                source,
            })?;
        }
        if let Some(parent) = non_empty_parent(&self.database_path) {
            std::fs::create_dir_all(parent).map_err(|source| HarvestError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, HarvestError> {
    raw.trim()
        .parse()
        .map_err(|_| HarvestError::InvalidConfig(format!("{key} must be a number, got '{raw}'")))
}

/// Number of rendering workers when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builder for [`HarvestConfig`].
#[derive(Debug)]
pub struct HarvestConfigBuilder {
    database_path: Option<PathBuf>,
    files_dir: Option<PathBuf>,
    images_dir: Option<PathBuf>,
    links_cache_path: Option<PathBuf>,
    source_url: String,
    link_selector: String,
    batch_size: usize,
    retry: RetryPolicy,
    download_timeout_secs: u64,
    workers: usize,
    dpi: u32,
    max_rendered_pixels: u32,
}

impl Default for HarvestConfigBuilder {
    fn default() -> Self {
        Self {
            database_path: None,
            files_dir: None,
            images_dir: None,
            links_cache_path: None,
            source_url: DEFAULT_SOURCE_URL.to_string(),
            link_selector: DEFAULT_LINK_SELECTOR.to_string(),
            batch_size: 4,
            retry: RetryPolicy::default(),
            download_timeout_secs: 120,
            workers: default_workers(),
            dpi: 300,
            max_rendered_pixels: 6000,
        }
    }
}

impl HarvestConfigBuilder {
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn files_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.files_dir = Some(path.into());
        self
    }

    pub fn images_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.images_dir = Some(path.into());
        self
    }

    pub fn links_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.links_cache_path = Some(path.into());
        self
    }

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    pub fn link_selector(mut self, selector: impl Into<String>) -> Self {
        self.link_selector = selector.into();
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n.max(1);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.download_timeout_secs = secs;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.max_rendered_pixels = px.max(100);
        self
    }

    /// Build the configuration, failing on the first missing location.
    pub fn build(self) -> Result<HarvestConfig, HarvestError> {
        let database_path = self.database_path.ok_or(HarvestError::MissingConfig {
            key: env::DATABASE_PATH,
        })?;
        let files_dir = self.files_dir.ok_or(HarvestError::MissingConfig {
            key: env::FILES_DIR,
        })?;
        let images_dir = self.images_dir.ok_or(HarvestError::MissingConfig {
            key: env::IMAGES_DIR,
        })?;
        let links_cache_path = self.links_cache_path.ok_or(HarvestError::MissingConfig {
            key: env::LINKS_CACHE_PATH,
        })?;

        if self.download_timeout_secs == 0 {
            return Err(HarvestError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(HarvestError::InvalidConfig(
                "Retry policy needs at least one attempt".into(),
            ));
        }
        if reqwest::Url::parse(&self.source_url).is_err() {
            return Err(HarvestError::InvalidConfig(format!(
                "Source URL '{}' is not a valid URL",
                self.source_url
            )));
        }

        Ok(HarvestConfig {
            database_path,
            files_dir,
            images_dir,
            links_cache_path,
            source_url: self.source_url,
            link_selector: self.link_selector,
            batch_size: self.batch_size,
            retry: self.retry,
            download_timeout_secs: self.download_timeout_secs,
            workers: self.workers,
            dpi: self.dpi,
            max_rendered_pixels: self.max_rendered_pixels,
        })
    }
}
