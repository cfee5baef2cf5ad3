//! The loader contract: an ordered, restartable sequence of page views.

use shared_types::PageView;

use crate::image_reader::ImageReader;
use crate::pdf_reader::PdfReader;
use crate::sniff::{sniff, SourceKind};
use crate::{DocumentError, DocumentResult};

/// Loader configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Rasterization density for vector (paginated) sources.
    pub target_dpi: u32,
    /// Density recorded for raster sources, which keep native resolution
    /// but rarely carry reliable density metadata.
    pub raster_dpi: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            target_dpi: 200,
            raster_dpi: 96,
        }
    }
}

/// A loaded document producing pages in ascending index order.
///
/// `page(i)` is restartable: calling it twice for the same index yields the
/// same view. Implementations may decode lazily but must not reorder.
pub trait DocumentReader: Send {
    fn page_count(&self) -> u32;

    fn page(&self, page_index: u32) -> DocumentResult<PageView>;

    fn source_kind(&self) -> SourceKind;
}

/// Sniff the container and construct the matching reader.
pub fn open(bytes: &[u8], config: &LoaderConfig) -> DocumentResult<Box<dyn DocumentReader>> {
    match sniff(bytes) {
        Some(SourceKind::Pdf) => Ok(Box::new(PdfReader::open(bytes, config)?)),
        Some(kind) => Ok(Box::new(ImageReader::open(bytes, kind, config)?)),
        None => Err(DocumentError::UnsupportedFormat),
    }
}
