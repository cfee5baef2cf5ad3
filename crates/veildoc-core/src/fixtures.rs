//! Deterministic detector stands-ins for tests and embedding.
//!
//! Real deployments inject model-backed detectors; these fixtures replay a
//! fixed detection set, which is exactly the determinism the detector
//! contract requires.

use std::time::Duration;

use detection_engine::{DetectionError, TextDetector, VisualDetector};
use shared_types::{Detection, PageView};

/// Replays a fixed set of visual detections, filtered per page.
pub struct StubVisualDetector {
    tag: String,
    detections: Vec<Detection>,
}

impl StubVisualDetector {
    pub fn new(tag: impl Into<String>, detections: Vec<Detection>) -> Self {
        Self {
            tag: tag.into(),
            detections,
        }
    }

    /// A detector that never reports anything.
    pub fn empty() -> Self {
        Self::new("stub-visual-v1", Vec::new())
    }
}

impl VisualDetector for StubVisualDetector {
    fn model_tag(&self) -> &str {
        &self.tag
    }

    fn detect(&self, page: &PageView) -> Result<Vec<Detection>, DetectionError> {
        Ok(self
            .detections
            .iter()
            .filter(|d| d.page_index == page.page_index)
            .cloned()
            .collect())
    }
}

/// Replays a fixed set of textual detections, filtered per page. Stands in
/// for an OCR-backed detector on pages without a text layer.
pub struct StubTextDetector {
    tag: String,
    detections: Vec<Detection>,
}

impl StubTextDetector {
    pub fn new(tag: impl Into<String>, detections: Vec<Detection>) -> Self {
        Self {
            tag: tag.into(),
            detections,
        }
    }

    pub fn empty() -> Self {
        Self::new("stub-text-v1", Vec::new())
    }
}

impl TextDetector for StubTextDetector {
    fn model_tag(&self) -> &str {
        &self.tag
    }

    fn detect(&self, page: &PageView) -> Result<Vec<Detection>, DetectionError> {
        Ok(self
            .detections
            .iter()
            .filter(|d| d.page_index == page.page_index)
            .cloned()
            .collect())
    }
}

/// Sleeps before answering; pairs with `per_page_deadline` tests.
pub struct SlowVisualDetector {
    pub delay: Duration,
}

impl VisualDetector for SlowVisualDetector {
    fn model_tag(&self) -> &str {
        "slow-visual-v1"
    }

    fn detect(&self, _page: &PageView) -> Result<Vec<Detection>, DetectionError> {
        std::thread::sleep(self.delay);
        Ok(Vec::new())
    }
}

/// Always unavailable.
pub struct FailingVisualDetector;

impl VisualDetector for FailingVisualDetector {
    fn model_tag(&self) -> &str {
        "failing-visual-v1"
    }

    fn detect(&self, _page: &PageView) -> Result<Vec<Detection>, DetectionError> {
        Err(DetectionError::Unavailable("model backend offline".into()))
    }
}
