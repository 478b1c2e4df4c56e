//! Error types for the pdf-harvest library.
//!
//! Failures fall into tiers that mirror how far they are allowed to travel:
//!
//! * [`HarvestError`] (**fatal**): the run cannot continue (missing
//!   configuration, catalog unreachable, link source down). Returned as
//!   `Err(HarvestError)` from the top-level [`crate::pipeline::Harvester`]
//!   entry points.
//!
//! * [`CatalogError`]: storage failures that are *not* integrity conflicts.
//!   Duplicate names and page ordinals are expected on reruns; the catalog
//!   logs and skips them and they never appear here. Anything that does
//!   appear (disk full, missing table, locked database) is fatal.
//!
//! * [`DownloadError`] (**per URL**): one file could not be fetched after
//!   its retry budget. Sibling downloads keep going; the error ends up in
//!   [`crate::download::DownloadReport::failed`].
//!
//! * [`RenderError`] (**per document**): one PDF could not be rasterised.
//!   The document is left without pages so the next run retries it.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-harvest library.
#[derive(Debug, Error)]
pub enum HarvestError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// A required location was not configured.
    #[error("Missing required setting '{key}'\nSet the {key} environment variable or pass the matching flag.")]
    MissingConfig { key: &'static str },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catalog errors ────────────────────────────────────────────────────
    /// The catalog failed with a non-integrity error.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    // ── Link errors ───────────────────────────────────────────────────────
    /// The link source page could not be fetched or parsed.
    #[error("Failed to extract links from '{source_url}': {reason}")]
    LinkExtraction { source_url: String, reason: String },

    /// The persisted link list could not be read or written.
    #[error("Link cache '{path}' is unusable: {source}")]
    LinkCache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A working directory could not be created.
    #[error("Failed to prepare directory '{path}': {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Storage failures surfaced by [`crate::catalog::Catalog`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// SQLite rejected the operation for a reason other than a skippable
    /// integrity conflict.
    #[error("Catalog storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A page referenced a document id that does not exist.
    #[error("Document {document_id} does not exist; cannot record page '{page_name}'")]
    MissingDocument { document_id: i64, page_name: String },

    /// The CSV export could not be written.
    #[error("Failed to write CSV export '{path}': {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Integrity conflicts the catalog recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// UNIQUE or PRIMARY KEY violation (duplicate name, duplicate ordinal).
    Unique,
    /// FOREIGN KEY violation (page for a missing document).
    ForeignKey,
    /// Any other constraint (NOT NULL, CHECK).
    Other,
}

impl Conflict {
    /// Classify a rusqlite error; `None` means it is not a constraint violation.
    pub fn classify(err: &rusqlite::Error) -> Option<Self> {
        use rusqlite::ffi;

        match err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Some(match e.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        Conflict::Unique
                    }
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Conflict::ForeignKey,
                    _ => Conflict::Other,
                })
            }
            _ => None,
        }
    }
}

/// A non-fatal error for a single URL.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The URL cannot be parsed or has no file name component.
    #[error("Invalid download URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} while downloading '{url}'")]
    Status { url: String, status: u16 },

    /// Connection, TLS or body-read failure.
    #[error("Transport error while downloading '{url}': {reason}")]
    Transport { url: String, reason: String },

    /// One attempt exceeded the per-file timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    Timeout { url: String, secs: u64 },

    /// Writing the local file failed.
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Timeouts, transport and I/O failures, HTTP 408, 429 and every 5xx are
    /// transient. Other 4xx answers and malformed URLs are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            DownloadError::InvalidUrl { .. } => false,
            DownloadError::Status { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            DownloadError::Transport { .. }
            | DownloadError::Timeout { .. }
            | DownloadError::Io { .. } => true,
        }
    }
}

/// A non-fatal error for a single document during rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The downloaded file is not on disk.
    #[error("Source PDF '{path}' not found; was it downloaded?")]
    MissingSource { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error("Failed to bind to pdfium library: {0}\nSet PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide.")]
    PdfiumBindingFailed(String),

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page} of '{path}': {detail}")]
    RasterisationFailed {
        path: PathBuf,
        page: usize,
        detail: String,
    },

    /// A rendered page could not be written as an image.
    #[error("Failed to save page image '{path}': {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Output directory creation failed.
    #[error("Failed to prepare image directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The worker thread running the render panicked or was cancelled.
    #[error("Render worker for '{document}' did not finish: {detail}")]
    WorkerFailed { document: String, detail: String },
}
