//! Per-page working set: raster buffer plus optional positioned text layer.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::geometry::BoundingBox;

/// A positioned text run extracted from a page's text layer (or OCR).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    pub bbox: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    /// Position of this span in the page's natural reading order.
    pub reading_order: u32,
}

/// Immutable RGB8 pixel buffer for one page.
///
/// Page rasters hold the most sensitive bytes in the pipeline, so the
/// backing buffer is wiped when the raster is released.
#[derive(Debug)]
pub struct PageRaster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PageRaster {
    /// Wrap a row-major RGB8 buffer. The buffer length must be exactly
    /// `width * height * 3`.
    pub fn from_rgb8(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 || pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// A blank white page.
    pub fn white(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0xff; width as usize * height as usize * 3],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major RGB8 bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Copy the pixel buffer out, e.g. to seed a mutable output raster.
    pub fn to_vec(&self) -> Vec<u8> {
        self.pixels.clone()
    }
}

impl Clone for PageRaster {
    fn clone(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            pixels: self.pixels.clone(),
        }
    }
}

impl PartialEq for PageRaster {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.pixels == other.pixels
    }
}

impl Drop for PageRaster {
    fn drop(&mut self) {
        self.pixels.zeroize();
    }
}

/// One page as seen by the pipeline: raster plus optional text layer.
///
/// Created by the document loader, handed read-only to detectors, and
/// dropped as soon as the page's redacted output has been written.
#[derive(Debug, Clone)]
pub struct PageView {
    pub page_index: u32,
    pub width_px: u32,
    pub height_px: u32,
    pub dpi: u32,
    pub raster: PageRaster,
    /// `Some` iff the source carried an embedded text layer (or a text
    /// detector ran OCR and back-filled spans).
    pub text_spans: Option<Vec<TextSpan>>,
}

impl PageView {
    pub fn new(page_index: u32, dpi: u32, raster: PageRaster) -> Self {
        Self {
            page_index,
            width_px: raster.width(),
            height_px: raster.height(),
            dpi,
            raster,
            text_spans: None,
        }
    }

    pub fn with_text_spans(mut self, spans: Vec<TextSpan>) -> Self {
        self.text_spans = Some(spans);
        self
    }

    /// Every text span lies within the page bounds.
    pub fn is_valid(&self) -> bool {
        match &self.text_spans {
            None => true,
            Some(spans) => spans
                .iter()
                .all(|s| s.bbox.fits_page(self.width_px, self.height_px)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_rejects_wrong_buffer_length() {
        assert!(PageRaster::from_rgb8(10, 10, vec![0; 299]).is_none());
        assert!(PageRaster::from_rgb8(10, 10, vec![0; 300]).is_some());
        assert!(PageRaster::from_rgb8(0, 10, vec![]).is_none());
    }

    #[test]
    fn test_white_raster_dimensions() {
        let r = PageRaster::white(4, 3);
        assert_eq!(r.width(), 4);
        assert_eq!(r.height(), 3);
        assert_eq!(r.as_bytes().len(), 36);
        assert!(r.as_bytes().iter().all(|&b| b == 0xff));
    }

    #[test]
    fn test_page_view_span_containment() {
        let page = PageView::new(0, 200, PageRaster::white(100, 50));
        assert!(page.is_valid());

        let inside = page.clone().with_text_spans(vec![TextSpan {
            text: "ok".into(),
            bbox: BoundingBox::new(10, 10, 20, 10),
            language: None,
            font_size: None,
            reading_order: 0,
        }]);
        assert!(inside.is_valid());

        let outside = page.with_text_spans(vec![TextSpan {
            text: "overflow".into(),
            bbox: BoundingBox::new(90, 45, 20, 10),
            language: None,
            font_size: None,
            reading_order: 0,
        }]);
        assert!(!outside.is_valid());
    }
}
