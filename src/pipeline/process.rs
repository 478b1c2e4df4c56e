//! One document, end to end: guard, render, record pages.

use tracing::{debug, error, info, warn};

use crate::catalog::{Catalog, Document, NewPage, PageBatchReport};
use crate::config::HarvestConfig;
use crate::error::{CatalogError, RenderError};

use super::render::Renderer;

/// What happened to a single document.
#[derive(Debug)]
pub enum DocumentOutcome {
    /// Pages were rendered and handed to the catalog.
    Rendered {
        pages: usize,
        report: PageBatchReport,
    },
    /// The document already had pages; nothing was done.
    Skipped,
    /// Rendering failed. No pages were recorded, so a later run retries it.
    Failed(RenderError),
}

/// Render `document` and record its pages, unless it already has some.
///
/// The page check runs before rendering, so a rerun over a fully processed
/// catalog performs no rendering work at all. Ordinals are 0-based and follow
/// the renderer's page order.
///
/// Only catalog failures are returned as `Err`; a render failure is a
/// [`DocumentOutcome::Failed`].
pub fn process_one_document(
    catalog: &mut Catalog,
    renderer: &dyn Renderer,
    config: &HarvestConfig,
    document: &Document,
) -> Result<DocumentOutcome, CatalogError> {
    if catalog.has_pages(document.id)? {
        debug!("{} already has pages, skipping", document.name);
        return Ok(DocumentOutcome::Skipped);
    }

    let pdf_path = config.document_path(&document.name);
    let names = match renderer.render(&pdf_path, &config.images_dir) {
        Ok(names) => names,
        Err(e) => {
            error!("Failed to render {}: {}", document.name, e);
            return Ok(DocumentOutcome::Failed(e));
        }
    };
    if names.is_empty() {
        warn!("{} rendered zero pages", document.name);
    }

    let pages: Vec<NewPage> = names
        .into_iter()
        .enumerate()
        .map(|(ordinal, name)| NewPage {
            document_id: document.id,
            page: ordinal as u32,
            name,
        })
        .collect();

    let report = catalog.add_pages(&pages)?;
    info!(
        "Processed {}: {} pages ({} inserted, {} skipped, {} failed)",
        document.name,
        pages.len(),
        report.inserted,
        report.skipped,
        report.failed
    );
    Ok(DocumentOutcome::Rendered {
        pages: pages.len(),
        report,
    })
}
