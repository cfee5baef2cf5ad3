//! Built-in pattern-based text detector.

use shared_types::{BoundingBox, Detection, PageView, TextSpan};

use crate::patterns::{scan_text, PatternMatch};
use crate::traits::TextDetector;
use crate::DetectionError;

const MODEL_TAG: &str = "pattern-text-v1";

/// Reference text detector: regex tables over the page's text spans.
///
/// Works only on pages that carry a text layer; OCR-backed detection is an
/// external implementation of the same trait. Match coordinates inside a
/// span are derived by proportional glyph-width split, which holds up well
/// for the monospaced-ish runs produced by document text layers.
#[derive(Debug, Default)]
pub struct PatternTextDetector;

impl PatternTextDetector {
    pub fn new() -> Self {
        Self
    }

    fn match_bbox(span: &TextSpan, found: &PatternMatch) -> Option<BoundingBox> {
        let total_chars = span.text.chars().count();
        if total_chars == 0 {
            return None;
        }
        let char_width = span.bbox.width as f64 / total_chars as f64;
        let x = span.bbox.x as f64 + char_width * found.char_start as f64;
        let width = (char_width * found.char_len as f64).round().max(1.0);
        Some(BoundingBox::new(
            x.round() as u32,
            span.bbox.y,
            width as u32,
            span.bbox.height,
        ))
    }
}

impl TextDetector for PatternTextDetector {
    fn model_tag(&self) -> &str {
        MODEL_TAG
    }

    fn detect(&self, page: &PageView) -> Result<Vec<Detection>, DetectionError> {
        let Some(spans) = &page.text_spans else {
            // No embedded text layer and this detector carries no OCR.
            return Ok(Vec::new());
        };

        let mut detections = Vec::new();
        for span in spans {
            for found in scan_text(&span.text) {
                let Some(bbox) = Self::match_bbox(span, &found) else {
                    continue;
                };
                let mut detection = Detection::textual(
                    found.kind,
                    page.page_index,
                    bbox,
                    found.confidence,
                    found.text,
                    MODEL_TAG,
                );
                if let Some(language) = &span.language {
                    detection = detection.with_language(language.clone());
                }
                detections.push(detection);
            }
        }
        Ok(detections)
    }
}
