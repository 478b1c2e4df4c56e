//! CSV export of the document table.

use std::io::Write;
use std::path::Path;

use tracing::info;

use super::{Catalog, Result};
use crate::error::CatalogError;

impl Catalog {
    /// Write `id,name,href` rows, header first, one document per line.
    ///
    /// Values are written verbatim. Names are URL basenames and hrefs are
    /// URLs, so neither carries a raw comma in practice.
    pub fn export_csv(&self, out_path: &Path) -> Result<usize> {
        let documents = self.list_documents()?;

        let mut csv = String::from("id,name,href\n");
        for doc in &documents {
            csv.push_str(&format!("{},{},{}\n", doc.id, doc.name, doc.href));
        }

        let write = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(out_path)?;
            file.write_all(csv.as_bytes())?;
            file.flush()
        };
        write().map_err(|source| CatalogError::Export {
            path: out_path.to_path_buf(),
            source,
        })?;

        info!("Exported {} documents to {}", documents.len(), out_path.display());
        Ok(documents.len())
    }
}
