//! Page insertion and queries.
//!
//! [`Catalog::add_pages`] is optimistically atomic: the whole batch goes in
//! one transaction. When that transaction hits an integrity conflict it is
//! rolled back and the batch is replayed row by row through
//! [`Catalog::add_page`], so the conflicting rows are skipped while every
//! other row still lands.

use rusqlite::params;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::models::{NewPage, Page};
use super::{Catalog, Result};
use crate::error::{CatalogError, Conflict};

const INSERT_PAGE: &str = "INSERT INTO pages (document_id, page, name) VALUES (?1, ?2, ?3)";

/// Result of a single [`Catalog::add_page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageInsert {
    /// Row created with this id.
    Inserted(i64),
    /// A page with the same name or ordinal already exists.
    Skipped,
}

/// Outcome of [`Catalog::add_pages`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageBatchReport {
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Whether the atomic attempt was abandoned for per-row insertion.
    pub fell_back: bool,
}

impl Catalog {
    /// Insert one page.
    ///
    /// A duplicate name or `(document_id, page)` pair is logged and skipped.
    /// A page for a missing document returns [`CatalogError::MissingDocument`].
    pub fn add_page(&self, page: &NewPage) -> Result<PageInsert> {
        match self
            .conn
            .execute(INSERT_PAGE, params![page.document_id, page.page, page.name])
        {
            Ok(_) => Ok(PageInsert::Inserted(self.conn.last_insert_rowid())),
            Err(e) => match Conflict::classify(&e) {
                Some(Conflict::ForeignKey) => Err(CatalogError::MissingDocument {
                    document_id: page.document_id,
                    page_name: page.name.clone(),
                }),
                Some(_) => {
                    warn!("Page '{}' already exists in the catalog: {}", page.name, e);
                    Ok(PageInsert::Skipped)
                }
                None => Err(e.into()),
            },
        }
    }

    /// Insert a batch of pages, atomically if possible.
    ///
    /// Non-integrity errors during the atomic attempt are returned. During the
    /// per-row fallback any single-row failure is logged and counted in
    /// [`PageBatchReport::failed`] without stopping the remaining rows.
    pub fn add_pages(&mut self, pages: &[NewPage]) -> Result<PageBatchReport> {
        let tx = self.conn.transaction()?;
        let attempt = {
            let mut stmt = tx.prepare(INSERT_PAGE)?;
            pages.iter().try_for_each(|page| {
                stmt.execute(params![page.document_id, page.page, page.name])
                    .map(drop)
            })
        };

        match attempt {
            Ok(()) => {
                tx.commit()?;
                debug!("Inserted {} pages in one transaction", pages.len());
                return Ok(PageBatchReport {
                    inserted: pages.len(),
                    ..PageBatchReport::default()
                });
            }
            Err(e) if Conflict::classify(&e).is_some() => {
                tx.rollback()?;
                warn!("Error adding pages to the catalog: {}", e);
            }
            Err(e) => return Err(e.into()),
        }

        info!("Falling back to adding {} pages individually", pages.len());
        let mut report = PageBatchReport {
            fell_back: true,
            ..PageBatchReport::default()
        };
        for page in pages {
            match self.add_page(page) {
                Ok(PageInsert::Inserted(_)) => report.inserted += 1,
                Ok(PageInsert::Skipped) => report.skipped += 1,
                Err(e) => {
                    error!("Failed to add page '{}': {}", page.name, e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Pages of one document, ordered by ordinal.
    pub fn list_pages(&self, document_id: i64) -> Result<Vec<Page>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM pages WHERE document_id = ?1 ORDER BY page")?;
        let pages = stmt
            .query_map(params![document_id], Page::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    /// Whether any page has been recorded for the document.
    pub fn has_pages(&self, document_id: i64) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM pages WHERE document_id = ?1)",
            params![document_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn count_pages(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
