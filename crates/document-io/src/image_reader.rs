//! Single-page raster documents (PNG, JPEG, TIFF, BMP).

use shared_types::{PageRaster, PageView};

use crate::reader::{DocumentReader, LoaderConfig};
use crate::sniff::SourceKind;
use crate::{DocumentError, DocumentResult};

/// A raster image treated as a one-page document at native resolution.
pub struct ImageReader {
    kind: SourceKind,
    dpi: u32,
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl ImageReader {
    pub fn open(bytes: &[u8], kind: SourceKind, config: &LoaderConfig) -> DocumentResult<Self> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| DocumentError::CorruptInput(e.to_string()))?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(DocumentError::CorruptInput("empty image".into()));
        }
        Ok(Self {
            kind,
            dpi: config.raster_dpi,
            width,
            height,
            rgb: rgb.into_raw(),
        })
    }
}

impl DocumentReader for ImageReader {
    fn page_count(&self) -> u32 {
        1
    }

    fn page(&self, page_index: u32) -> DocumentResult<PageView> {
        if page_index != 0 {
            return Err(DocumentError::PageOutOfRange {
                page_index,
                page_count: 1,
            });
        }
        let raster = PageRaster::from_rgb8(self.width, self.height, self.rgb.clone())
            .ok_or_else(|| DocumentError::PageDecodeFailed {
                page_index,
                detail: "raster buffer size mismatch".into(),
            })?;
        // Raster sources carry no embedded text layer.
        Ok(PageView::new(page_index, self.dpi, raster))
    }

    fn source_kind(&self) -> SourceKind {
        self.kind
    }
}
