//! SQLite catalog of documents and their rendered pages.
//!
//! The catalog is split into submodules:
//! - `schema`: idempotent table/index creation
//! - `documents`: batch registration and document queries
//! - `pages`: page insertion with atomic-then-fallback semantics
//! - `export`: CSV export of the document table
//! - `models`: row types
//!
//! A [`Catalog`] owns exactly one `rusqlite::Connection`. Connections are
//! never shared across threads; a rendering worker obtains its own through a
//! [`CatalogHandle`]. Uniqueness and foreign-key constraints in the schema are
//! what keeps concurrent workers from producing duplicate or orphaned rows.

mod documents;
mod export;
mod models;
mod pages;
mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::error::CatalogError;

pub use documents::{document_entries, RegisterOutcome};
pub use models::{Document, NewDocument, NewPage, Page};
pub use pages::{PageBatchReport, PageInsert};

pub type Result<T> = std::result::Result<T, CatalogError>;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite-backed catalog.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open (or create) the catalog at `path` and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        debug!("Opened catalog at {}", path.display());
        Self::with_connection(conn)
    }

    /// Open a private in-memory catalog.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let catalog = Self { conn };
        catalog.initialize_schema()?;
        Ok(catalog)
    }
}

/// A path-only token from which each worker opens its own [`Catalog`].
///
/// `CatalogHandle` is `Clone + Send + Sync`; `Catalog` itself is only `Send`,
/// so a connection cannot be shared across the render pool by accident.
#[derive(Debug, Clone)]
pub struct CatalogHandle {
    path: PathBuf,
}

impl CatalogHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open a fresh connection for the calling worker.
    pub fn open(&self) -> Result<Catalog> {
        Catalog::open(&self.path)
    }
}
