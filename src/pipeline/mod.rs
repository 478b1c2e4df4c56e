//! The harvest pipeline: fetch documents, then render them into page images.
//!
//! ## Data Flow
//!
//! ```text
//! links ──▶ download ──▶ register ──▶ render ──▶ record pages
//! (cache)   (batches)    (catalog)    (pool)     (catalog)
//! ```
//!
//! [`Harvester::fetch`] covers the first three steps and runs on the async
//! executor. [`Harvester::render_all`] fans documents out to a pool of
//! blocking workers, each handling one document end to end through
//! [`process_one_document`] on its own catalog connection.
//!
//! Every step is safe to rerun: cached links are reused, present files are
//! not fetched again, duplicate registrations are rejected by the catalog,
//! and documents that already have pages are skipped before rendering.

pub mod process;
pub mod render;

use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{document_entries, Catalog, CatalogHandle, Document, RegisterOutcome};
use crate::config::HarvestConfig;
use crate::download::{DownloadReport, Downloader, Fetch};
use crate::error::{HarvestError, RenderError};
use crate::links::{acquire_links, LinkCache, LinkExtractor};
use crate::progress::ProgressSink;

pub use process::{process_one_document, DocumentOutcome};
pub use render::{page_image_name, PdfiumRenderer, Renderer};

/// Result of [`Harvester::fetch`].
#[derive(Debug)]
pub struct FetchReport {
    /// Links known after extraction or cache load.
    pub links: usize,
    pub downloads: DownloadReport,
    pub registration: RegisterOutcome,
}

/// Totals of a [`Harvester::render_all`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderReport {
    /// Documents rendered and recorded in this run.
    pub processed: usize,
    /// Documents that already had pages.
    pub skipped: usize,
    /// Documents that failed to render; they stay pending.
    pub failed: usize,
    /// Page rows inserted across all documents.
    pub pages_added: usize,
}

/// Drives a harvest run against one catalog.
///
/// The catalog connection is opened lazily on first use so that building a
/// `Harvester` never touches the disk.
pub struct Harvester {
    config: HarvestConfig,
    catalog: Option<Catalog>,
}

impl Harvester {
    pub fn new(config: HarvestConfig) -> Self {
        Self {
            config,
            catalog: None,
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// The orchestrator's own catalog connection, opened on first call.
    pub fn catalog(&mut self) -> Result<&mut Catalog, HarvestError> {
        let catalog = match self.catalog.take() {
            Some(catalog) => catalog,
            None => {
                self.config.ensure_dirs()?;
                Catalog::open(&self.config.database_path)?
            }
        };
        Ok(self.catalog.insert(catalog))
    }

    /// Load cached links or extract and cache them.
    pub async fn links(&self, extractor: &dyn LinkExtractor) -> Result<Vec<String>, HarvestError> {
        let cache = LinkCache::new(&self.config.links_cache_path);
        acquire_links(&cache, extractor).await
    }

    /// Acquire links, download every document, and register them all.
    ///
    /// Every link is registered, downloaded or not. A document whose file is
    /// missing fails at render time and is retried on a later run, once the
    /// next `fetch` has picked the file up.
    pub async fn fetch<F: Fetch>(
        &mut self,
        extractor: &dyn LinkExtractor,
        downloader: &Downloader<F>,
    ) -> Result<FetchReport, HarvestError> {
        self.config.ensure_dirs()?;
        let links = self.links(extractor).await?;
        info!("Acquired {} links", links.len());

        let downloads = downloader
            .download_documents(&links, &self.config.files_dir)
            .await;
        for failed in &downloads.failed {
            warn!("Not downloaded: {} ({})", failed.url, failed.error);
        }

        let entries = document_entries(&links);
        let registration = self.catalog()?.register_documents(&entries)?;

        Ok(FetchReport {
            links: links.len(),
            downloads,
            registration,
        })
    }

    /// Render every catalogued document that has no pages yet.
    ///
    /// At most `config.workers` documents are in flight. A render failure is
    /// counted and logged; a catalog failure in any worker aborts the run.
    pub async fn render_all(
        &mut self,
        renderer: Arc<dyn Renderer>,
        progress: ProgressSink,
    ) -> Result<RenderReport, HarvestError> {
        let documents = self.catalog()?.list_documents()?;
        let workers = self.config.workers.max(1);
        info!(
            "Ready to process {} documents with {} workers",
            documents.len(),
            workers
        );
        progress.on_render_start(documents.len());

        let handle = CatalogHandle::new(&self.config.database_path);
        let config = Arc::new(self.config.clone());

        let mut outcomes = stream::iter(documents.into_iter().map(|document| {
            let handle = handle.clone();
            let renderer = Arc::clone(&renderer);
            let config = Arc::clone(&config);
            async move {
                let name = document.name.clone();
                let joined = tokio::task::spawn_blocking(move || {
                    render_in_worker(&handle, renderer.as_ref(), &config, &document)
                })
                .await;
                let outcome = match joined {
                    Ok(result) => result,
                    Err(e) => Ok(DocumentOutcome::Failed(RenderError::WorkerFailed {
                        document: name.clone(),
                        detail: e.to_string(),
                    })),
                };
                (name, outcome)
            }
        }))
        .buffer_unordered(workers);

        let mut report = RenderReport::default();
        while let Some((name, outcome)) = outcomes.next().await {
            match outcome? {
                DocumentOutcome::Rendered { pages, report: rows } => {
                    report.processed += 1;
                    report.pages_added += rows.inserted;
                    progress.on_document_complete(&name, pages);
                }
                DocumentOutcome::Skipped => {
                    report.skipped += 1;
                    progress.on_document_skipped(&name);
                }
                DocumentOutcome::Failed(e) => {
                    report.failed += 1;
                    progress.on_document_error(&name, &e.to_string());
                }
            }
        }

        info!(
            "Render finished: {} processed, {} skipped, {} failed, {} pages added",
            report.processed, report.skipped, report.failed, report.pages_added
        );
        progress.on_render_complete(&report);
        Ok(report)
    }

    /// Write the documents table to `out_path` as CSV.
    pub fn export_csv(&mut self, out_path: &Path) -> Result<usize, HarvestError> {
        Ok(self.catalog()?.export_csv(out_path)?)
    }
}

fn render_in_worker(
    handle: &CatalogHandle,
    renderer: &dyn Renderer,
    config: &HarvestConfig,
    document: &Document,
) -> Result<DocumentOutcome, HarvestError> {
    debug!("Worker picked up {}", document.name);
    let mut catalog = handle.open()?;
    Ok(process_one_document(&mut catalog, renderer, config, document)?)
}
