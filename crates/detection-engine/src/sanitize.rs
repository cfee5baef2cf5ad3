//! Detector-output sanitization.
//!
//! Detectors are external collaborators; nothing they return is trusted.
//! Invalid detections are dropped and logged (without echoing detected
//! text), never fatal.

use shared_types::{Detection, DetectionSource, PageView};
use tracing::warn;

/// Validate and normalize one detector's output for a page.
///
/// Bboxes are clipped to the page; detections with out-of-range
/// confidences, mismatched sources or kinds, or bboxes entirely outside
/// the page are rejected.
pub fn sanitize_detections(
    raw: Vec<Detection>,
    page: &PageView,
    expected_source: DetectionSource,
) -> Vec<Detection> {
    let mut kept = Vec::with_capacity(raw.len());

    for mut detection in raw {
        if detection.source != expected_source {
            warn!(
                kind = detection.kind.tag(),
                expected = ?expected_source,
                got = ?detection.source,
                "dropping detection with mismatched source"
            );
            continue;
        }
        if !detection.kind_matches_source() {
            warn!(
                kind = detection.kind.tag(),
                source = ?detection.source,
                "dropping detection whose kind does not fit its source"
            );
            continue;
        }
        if !detection.has_valid_confidence() {
            warn!(
                kind = detection.kind.tag(),
                confidence = detection.confidence,
                "dropping detection with invalid confidence"
            );
            continue;
        }
        if detection.page_index != page.page_index {
            warn!(
                kind = detection.kind.tag(),
                expected = page.page_index,
                got = detection.page_index,
                "dropping detection reported for the wrong page"
            );
            continue;
        }
        match detection.bbox.clip_to(page.width_px, page.height_px) {
            Some(clipped) => {
                detection.bbox = clipped;
                kept.push(detection);
            }
            None => {
                warn!(
                    kind = detection.kind.tag(),
                    "dropping detection with bbox outside the page"
                );
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{BoundingBox, PageRaster, PiiKind};

    fn page() -> PageView {
        PageView::new(0, 96, PageRaster::white(100, 100))
    }

    #[test]
    fn test_valid_detection_passes() {
        let raw = vec![Detection::visual(
            PiiKind::Face,
            0,
            BoundingBox::new(10, 10, 20, 20),
            0.9,
            "m",
        )];
        let kept = sanitize_detections(raw, &page(), DetectionSource::Visual);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_overhanging_bbox_clipped() {
        let raw = vec![Detection::visual(
            PiiKind::Face,
            0,
            BoundingBox::new(90, 90, 30, 30),
            0.9,
            "m",
        )];
        let kept = sanitize_detections(raw, &page(), DetectionSource::Visual);
        assert_eq!(kept[0].bbox, BoundingBox::new(90, 90, 10, 10));
    }

    #[test]
    fn test_out_of_page_bbox_rejected() {
        let raw = vec![Detection::visual(
            PiiKind::Face,
            0,
            BoundingBox::new(200, 200, 10, 10),
            0.9,
            "m",
        )];
        assert!(sanitize_detections(raw, &page(), DetectionSource::Visual).is_empty());
    }

    #[test]
    fn test_nan_confidence_rejected() {
        let mut detection = Detection::visual(
            PiiKind::Face,
            0,
            BoundingBox::new(10, 10, 20, 20),
            0.9,
            "m",
        );
        detection.confidence = f64::NAN;
        assert!(sanitize_detections(vec![detection], &page(), DetectionSource::Visual).is_empty());
    }

    #[test]
    fn test_wrong_source_rejected() {
        let raw = vec![Detection::visual(
            PiiKind::Face,
            0,
            BoundingBox::new(10, 10, 20, 20),
            0.9,
            "m",
        )];
        assert!(sanitize_detections(raw, &page(), DetectionSource::Textual).is_empty());
    }

    #[test]
    fn test_kind_source_mismatch_rejected() {
        // A "visual" detector reporting an email is lying about something.
        let mut detection = Detection::visual(
            PiiKind::Face,
            0,
            BoundingBox::new(10, 10, 20, 20),
            0.9,
            "m",
        );
        detection.kind = PiiKind::Email;
        assert!(sanitize_detections(vec![detection], &page(), DetectionSource::Visual).is_empty());
    }

    #[test]
    fn test_wrong_page_index_rejected() {
        let raw = vec![Detection::visual(
            PiiKind::Face,
            7,
            BoundingBox::new(10, 10, 20, 20),
            0.9,
            "m",
        )];
        assert!(sanitize_detections(raw, &page(), DetectionSource::Visual).is_empty());
    }
}
