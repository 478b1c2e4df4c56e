//! Row types for the catalog tables.

use rusqlite::Row;
use serde::Serialize;

/// A cataloged source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: i64,
    /// URL basename; unique across the catalog.
    pub name: String,
    /// Source URL.
    pub href: String,
}

impl Document {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            href: row.get("href")?,
        })
    }
}

/// A candidate document; ids are always generated by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub name: String,
    pub href: String,
}

/// A rendered page image belonging to one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub id: i64,
    pub document_id: i64,
    /// 0-based position in the render output.
    pub page: u32,
    /// Image file name; unique across the catalog.
    pub name: String,
}

impl Page {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            document_id: row.get("document_id")?,
            page: row.get("page")?,
            name: row.get("name")?,
        })
    }
}

/// A page to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub document_id: i64,
    pub page: u32,
    pub name: String,
}
