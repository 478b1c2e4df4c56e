//! # pdf-harvest
//!
//! Download a published set of PDF documents, keep a SQLite catalog of them,
//! and rasterise every page to a PNG.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source page
//!  │
//!  ├─ 1. Links     scrape document anchors, cache them to a text file
//!  ├─ 2. Download  fixed-size concurrent batches, retry with backoff
//!  ├─ 3. Register  one atomic insert of every document into the catalog
//!  ├─ 4. Render    worker pool, pdfium on blocking threads
//!  └─ 5. Record    page rows per document, atomic with per-row fallback
//! ```
//!
//! Every stage is idempotent, so an interrupted run is resumed by running it
//! again.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_harvest::{Downloader, HarvestConfig, Harvester, HtmlLinkExtractor, NoopProgress, PdfiumRenderer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HarvestConfig::from_env()?;
//!     let extractor = HtmlLinkExtractor::new(&config.source_url, &config.link_selector);
//!     let downloader = Downloader::from_config(&config);
//!     let renderer = Arc::new(PdfiumRenderer::from_config(&config)?);
//!
//!     let mut harvester = Harvester::new(config);
//!     harvester.fetch(&extractor, &downloader).await?;
//!     let report = harvester.render_all(renderer, Arc::new(NoopProgress)).await?;
//!     eprintln!("{} documents rendered", report.processed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-harvest` binary (clap + anyhow + indicatif + tracing-subscriber + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod links;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use catalog::{Catalog, CatalogHandle, Document, Page, RegisterOutcome};
pub use config::{HarvestConfig, HarvestConfigBuilder};
pub use download::{DownloadReport, Downloader, Fetch, HttpFetcher, RetryPolicy};
pub use error::{CatalogError, DownloadError, HarvestError, RenderError};
pub use links::{HtmlLinkExtractor, LinkCache, LinkExtractor};
pub use pipeline::{
    process_one_document, DocumentOutcome, FetchReport, Harvester, PdfiumRenderer, RenderReport,
    Renderer,
};
pub use progress::{HarvestProgress, NoopProgress, ProgressSink};
