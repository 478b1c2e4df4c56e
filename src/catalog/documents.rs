//! Document registration and queries.

use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use super::models::{Document, NewDocument};
use super::{Catalog, Result};
use crate::error::Conflict;
use crate::links::url_basename;

/// Result of [`Catalog::register_documents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Every entry was inserted.
    Inserted(usize),
    /// At least one name already existed; nothing was inserted.
    Rejected,
}

/// Derive catalog entries from source URLs.
///
/// The name is the URL path basename. Links without one (e.g. ending in `/`)
/// cannot be stored or downloaded and are dropped with a warning.
pub fn document_entries<S: AsRef<str>>(links: &[S]) -> Vec<NewDocument> {
    links
        .iter()
        .filter_map(|link| {
            let href = link.as_ref().trim();
            match url_basename(href) {
                Some(name) => Some(NewDocument {
                    name,
                    href: href.to_string(),
                }),
                None => {
                    warn!("Skipping link without a file name: '{}'", href);
                    None
                }
            }
        })
        .collect()
}

impl Catalog {
    /// Insert all `entries` in one transaction.
    ///
    /// A uniqueness violation anywhere in the batch (including two entries
    /// sharing a name) rolls the whole batch back; no partial insert is ever
    /// committed. Other storage failures are returned as errors.
    pub fn register_documents(&mut self, entries: &[NewDocument]) -> Result<RegisterOutcome> {
        let tx = self.conn.transaction()?;
        let attempt = {
            let mut stmt = tx.prepare("INSERT INTO documents (name, href) VALUES (?1, ?2)")?;
            entries
                .iter()
                .try_for_each(|entry| stmt.execute(params![entry.name, entry.href]).map(drop))
        };

        match attempt {
            Ok(()) => {
                tx.commit()?;
                info!("Registered {} documents", entries.len());
                Ok(RegisterOutcome::Inserted(entries.len()))
            }
            Err(e) if Conflict::classify(&e).is_some() => {
                tx.rollback()?;
                warn!(
                    "Some documents already exist in the catalog; clear the stale rows and retry: {}",
                    e
                );
                Ok(RegisterOutcome::Rejected)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All documents, in insertion order.
    pub fn list_documents(&self) -> Result<Vec<Document>> {
        let mut stmt = self.conn.prepare("SELECT * FROM documents ORDER BY id")?;
        let documents = stmt
            .query_map([], Document::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    /// Look a document up by its unique name.
    pub fn document_by_name(&self, name: &str) -> Result<Option<Document>> {
        let document = self
            .conn
            .query_row(
                "SELECT * FROM documents WHERE name = ?1",
                params![name],
                Document::from_row,
            )
            .optional()?;
        Ok(document)
    }

    pub fn count_documents(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
