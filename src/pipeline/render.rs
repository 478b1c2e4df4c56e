//! PDF rasterisation: render every page of a document to a PNG file.
//!
//! The [`Renderer`] trait is synchronous on purpose: rasterising is CPU-bound
//! and runs on a blocking worker thread, never on an async executor thread.
//!
//! ## Output layout
//!
//! ```text
//! images_dir/
//!   104-10003-10041/
//!     104-10003-10041_page_1.png
//!     104-10003-10041_page_2.png
//! ```
//!
//! File names carry the 1-based page number; catalog ordinals are 0-based.

use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::HarvestConfig;
use crate::error::RenderError;

/// Environment variable pointing at a specific libpdfium.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Turns a local PDF into an ordered list of page image file names.
pub trait Renderer: Send + Sync {
    /// Render `pdf_path` into `out_dir/{stem}/`, returning file names in page
    /// order. The files exist on disk when this returns `Ok`.
    fn render(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<String>, RenderError>;
}

/// Name of the image for the page at 0-based `ordinal`.
pub fn page_image_name(stem: &str, ordinal: usize) -> String {
    format!("{}_page_{}.png", stem, ordinal + 1)
}

/// Document file name without its extension.
pub fn document_stem(pdf_path: &Path) -> String {
    pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// Create (if needed) and return the per-document image directory.
pub fn prepare_output_dir(
    pdf_path: &Path,
    out_dir: &Path,
) -> Result<(String, PathBuf), RenderError> {
    let stem = document_stem(pdf_path);
    let dir = out_dir.join(&stem);
    std::fs::create_dir_all(&dir).map_err(|source| RenderError::Io {
        path: dir.clone(),
        source,
    })?;
    Ok((stem, dir))
}

/// Renderer backed by pdfium.
///
/// The library is bound once and the handle is shared by every render
/// worker. pdfium-render's `sync` feature makes `Pdfium` `Send + Sync`;
/// its `thread_safe` feature serialises the calls into the library.
pub struct PdfiumRenderer {
    pdfium: Pdfium,
    dpi: u32,
    max_pixels: u32,
}

impl PdfiumRenderer {
    /// Bind pdfium from `PDFIUM_LIB_PATH`, falling back to the system library.
    pub fn from_config(config: &HarvestConfig) -> Result<Self, RenderError> {
        let library = std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from);
        Self::new(library.as_deref(), config.dpi, config.max_rendered_pixels)
    }

    pub fn new(library: Option<&Path>, dpi: u32, max_pixels: u32) -> Result<Self, RenderError> {
        let bindings = match library {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| RenderError::PdfiumBindingFailed(format!("{:?}", e)))?;

        Ok(Self {
            pdfium: Pdfium::new(bindings),
            dpi,
            max_pixels,
        })
    }

    fn render_config(&self) -> PdfRenderConfig {
        PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32)
    }
}

impl Renderer for PdfiumRenderer {
    fn render(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<String>, RenderError> {
        if !pdf_path.is_file() {
            return Err(RenderError::MissingSource {
                path: pdf_path.to_path_buf(),
            });
        }
        let (stem, doc_dir) = prepare_output_dir(pdf_path, out_dir)?;

        let document = self
            .pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| RenderError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let render_config = self.render_config();
        let pages = document.pages();
        let mut names = Vec::with_capacity(pages.len() as usize);

        for (index, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                RenderError::RasterisationFailed {
                    path: pdf_path.to_path_buf(),
                    page: index + 1,
                    detail: format!("{:?}", e),
                }
            })?;

            let name = page_image_name(&stem, index);
            let path = doc_dir.join(&name);
            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                index + 1,
                image.width(),
                image.height()
            );
            image
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|source| RenderError::ImageSave {
                    path: path.clone(),
                    source,
                })?;
            names.push(name);
        }

        info!("Rendered {} pages of {}", names.len(), pdf_path.display());
        Ok(names)
    }
}
