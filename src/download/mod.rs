//! Batched, retrying downloads of remote documents into a local directory.
//!
//! ## Guarantees
//!
//! - A file at `dest_dir/<basename>` is always complete. Bodies stream into a
//!   hidden temp file in the same directory and are renamed into place only
//!   after the last chunk is written; on any failure (status, transport,
//!   timeout, disk) the temp file is deleted.
//! - An existing destination file is never fetched again, so an interrupted
//!   run can simply be restarted.
//! - At most `batch_size` requests are in flight. Batches run strictly in
//!   sequence; inside a batch all downloads are polled concurrently on the
//!   calling task and completion order is unspecified.
//! - One URL exhausting its retries never aborts its siblings.

mod fetch;
mod retry;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::config::HarvestConfig;
use crate::error::DownloadError;
use crate::links::url_basename;
use crate::progress::{HarvestProgress, NoopProgress};

pub use fetch::{ChunkStream, Fetch, HttpFetcher};
pub use retry::RetryPolicy;

/// Batch size used when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 4;

/// What [`Downloader::download_file`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The body was fetched and persisted.
    Downloaded { path: PathBuf, bytes: u64 },
    /// The destination already existed; nothing was fetched.
    AlreadyPresent { path: PathBuf },
}

/// A URL whose retry budget ran out.
#[derive(Debug)]
pub struct FailedDownload {
    pub url: String,
    pub error: DownloadError,
}

/// Aggregate result of [`Downloader::download_documents`].
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub downloaded: usize,
    pub already_present: usize,
    pub failed: Vec<FailedDownload>,
}

impl DownloadReport {
    pub fn total(&self) -> usize {
        self.downloaded + self.already_present + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Downloads URLs in fixed-size concurrent batches.
pub struct Downloader<F = HttpFetcher> {
    fetcher: F,
    batch_size: usize,
    retry: RetryPolicy,
    timeout: Duration,
    progress: Arc<dyn HarvestProgress>,
}

impl Downloader<HttpFetcher> {
    /// Build a reqwest-backed downloader from the run configuration.
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(HttpFetcher::default())
            .batch_size(config.batch_size)
            .retry(config.retry)
            .timeout(config.download_timeout())
    }
}

impl<F: Fetch> Downloader<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(120),
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n.max(1);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Limit for a single attempt, body included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn progress(mut self, progress: Arc<dyn HarvestProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Download every URL into `dest_dir`, `batch_size` at a time.
    pub async fn download_documents<S: AsRef<str>>(
        &self,
        urls: &[S],
        dest_dir: &Path,
    ) -> DownloadReport {
        let total = urls.len();
        let mut report = DownloadReport::default();
        info!(
            "Downloading {} documents to {} in batches of {}",
            total,
            dest_dir.display(),
            self.batch_size
        );

        for (index, batch) in urls.chunks(self.batch_size).enumerate() {
            debug!("Starting batch {} ({} urls)", index + 1, batch.len());
            let results = join_all(batch.iter().map(|url| async move {
                let url = url.as_ref().trim();
                (url, self.download_file(url, dest_dir).await)
            }))
            .await;

            for (url, result) in results {
                match result {
                    Ok(DownloadOutcome::Downloaded { .. }) => report.downloaded += 1,
                    Ok(DownloadOutcome::AlreadyPresent { .. }) => report.already_present += 1,
                    Err(error) => report.failed.push(FailedDownload {
                        url: url.to_string(),
                        error,
                    }),
                }
            }
            self.progress.on_download_batch(report.total(), total);
        }

        info!(
            "Downloads finished: {} new, {} already present, {} failed",
            report.downloaded,
            report.already_present,
            report.failed.len()
        );
        report
    }

    /// Download one URL into `dest_dir`, retrying transient failures.
    pub async fn download_file(
        &self,
        url: &str,
        dest_dir: &Path,
    ) -> Result<DownloadOutcome, DownloadError> {
        let name = url_basename(url).ok_or_else(|| DownloadError::InvalidUrl {
            url: url.to_string(),
            reason: "no file name in URL path".into(),
        })?;
        let dest = dest_dir.join(&name);

        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            debug!("{} already present, skipping", dest.display());
            return Ok(DownloadOutcome::AlreadyPresent { path: dest });
        }

        let mut failed_attempts = 0;
        loop {
            match self.attempt(url, &name, dest_dir, &dest).await {
                Ok(bytes) => {
                    debug!("Downloaded {} ({} bytes)", url, bytes);
                    return Ok(DownloadOutcome::Downloaded { path: dest, bytes });
                }
                Err(e) => {
                    failed_attempts += 1;
                    if e.is_transient() && self.retry.allows_retry(failed_attempts) {
                        let backoff = self.retry.backoff(failed_attempts);
                        warn!(
                            "{}: attempt {}/{} failed: {}; retrying in {:?}",
                            url, failed_attempts, self.retry.max_attempts, e, backoff
                        );
                        tokio::time::sleep(backoff).await;
                    } else {
                        error!(
                            "{}: giving up after {} attempt(s): {}",
                            url, failed_attempts, e
                        );
                        return Err(e);
                    }
                }
            }
        }
    }

    /// One bounded attempt. Dropping the inner future on timeout drops the
    /// temp file with it.
    async fn attempt(
        &self,
        url: &str,
        name: &str,
        dest_dir: &Path,
        dest: &Path,
    ) -> Result<u64, DownloadError> {
        match tokio::time::timeout(self.timeout, self.stream_to_file(url, name, dest_dir, dest))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(DownloadError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    async fn stream_to_file(
        &self,
        url: &str,
        name: &str,
        dest_dir: &Path,
        dest: &Path,
    ) -> Result<u64, DownloadError> {
        let mut body = self.fetcher.open(url).await?;

        let temp = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".part")
            .tempfile_in(dest_dir)
            .map_err(|source| DownloadError::Io {
                path: dest_dir.to_path_buf(),
                source,
            })?;
        // `temp_path` deletes the file when dropped unless it is persisted.
        let (file, temp_path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let io_err = |source| DownloadError::Io {
            path: dest.to_path_buf(),
            source,
        };

        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        drop(file);

        temp_path.persist(dest).map_err(|e| io_err(e.error))?;
        Ok(written)
    }
}
