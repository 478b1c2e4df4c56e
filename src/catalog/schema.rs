//! Database schema initialization.

use super::{Catalog, Result};

impl Catalog {
    /// Create tables and indexes if they are absent.
    ///
    /// Safe on every startup: nothing is dropped or rewritten.
    pub fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                href TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id INTEGER NOT NULL,
                page INTEGER NOT NULL,
                name TEXT NOT NULL UNIQUE,
                FOREIGN KEY (document_id) REFERENCES documents(id)
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_name
                ON documents(name);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_pages_document_page
                ON pages(document_id, page);
            "#,
        )?;
        Ok(())
    }
}
