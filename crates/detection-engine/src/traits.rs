//! Detector contracts.
//!
//! The core never loads models; detector implementations are injected at
//! construction. Both contracts require determinism: the same raster and
//! the same `model_tag` must yield the same detections.

use shared_types::{Detection, PageView};

use crate::DetectionError;

/// Locates PII by pixel evidence: faces, signatures, barcodes, QR codes,
/// photo-ID portraits.
///
/// Receives the page raster only; returned detections must carry
/// `source = visual`, a visual kind, and a bbox inside the page.
pub trait VisualDetector: Send + Sync {
    /// Opaque model + version identifier recorded in audit records.
    fn model_tag(&self) -> &str;

    fn detect(&self, page: &PageView) -> Result<Vec<Detection>, DetectionError>;
}

/// Locates PII in the page's text: names, emails, identifiers.
///
/// When the page has no embedded text layer the implementation may run OCR
/// internally and report coordinates in page space. Returned detections
/// must carry `source = textual`, a textual kind, populated `text`, and a
/// `language` tag when known.
pub trait TextDetector: Send + Sync {
    /// Opaque model + version identifier recorded in audit records.
    fn model_tag(&self) -> &str;

    fn detect(&self, page: &PageView) -> Result<Vec<Detection>, DetectionError>;
}
