//! Page redaction: applies the fused detection set to a fresh output
//! raster and scrubs the text layer.

use image::RgbImage;
use profile_engine::{EffectiveProfile, StyleSpec};
use serde::{Deserialize, Serialize};
use shared_types::{BoundingBox, Detection, PageRaster, PageView, TextSpan};
use tracing::warn;
use uuid::Uuid;

use crate::fingerprint::page_fingerprint;
use crate::scrub::{scrub_spans, TextScrub};
use crate::styles::apply_style;
use crate::RedactionError;

/// A redaction box that fell back to solid black.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedRedaction {
    pub page_index: u32,
    pub detection_id: Uuid,
    pub reason: String,
}

/// One fully redacted page, ready for the output writer.
#[derive(Debug)]
pub struct RedactedPage {
    pub page_index: u32,
    pub raster: PageRaster,
    /// Scrubbed text layer, present iff the input page carried one.
    pub scrubbed_spans: Option<Vec<TextSpan>>,
    pub text_scrubs: Vec<TextScrub>,
    /// Pre-mux fingerprint of `raster`.
    pub fingerprint: String,
    pub redactions_applied: u32,
    pub degraded: Vec<DegradedRedaction>,
}

/// Apply the page's detections to a fresh output buffer.
///
/// The input raster is never written in place. Boxes render in `(y, x,
/// kind)` order with the last write winning; a box whose style fails to
/// render degrades to solid black instead of aborting the page.
pub fn redact_page(
    page: &PageView,
    detections: &[Detection],
    profile: &EffectiveProfile,
) -> RedactedPage {
    let mut canvas = RgbImage::from_raw(page.width_px, page.height_px, page.raster.to_vec())
        .expect("page raster invariant: buffer matches dimensions");

    let mut ordered: Vec<&Detection> = detections.iter().collect();
    ordered.sort_by_key(|d| (d.bbox.y, d.bbox.x, d.kind.tag()));

    let mut applied: Vec<BoundingBox> = Vec::new();
    let mut degraded: Vec<DegradedRedaction> = Vec::new();

    for detection in ordered {
        let Some(bbox) = detection.bbox.clip_to(page.width_px, page.height_px) else {
            warn!(
                kind = detection.kind.tag(),
                page = page.page_index,
                "skipping redaction box entirely outside the page"
            );
            continue;
        };
        let style = profile.style_for(detection.kind);
        if let Err(error) = apply_style(&mut canvas, bbox, style) {
            warn!(
                kind = detection.kind.tag(),
                page = page.page_index,
                %error,
                "style rendering failed, falling back to solid black"
            );
            // The fallback writes unconditionally; a box inside the page
            // cannot fail it.
            apply_style(&mut canvas, bbox, &StyleSpec::solid_black())
                .expect("solid fill over a clipped bbox");
            degraded.push(DegradedRedaction {
                page_index: page.page_index,
                detection_id: detection.id,
                reason: error.to_string(),
            });
        }
        applied.push(bbox);
    }

    let (scrubbed_spans, text_scrubs) = match &page.text_spans {
        Some(spans) => {
            let (scrubbed, records) = scrub_spans(page.page_index, spans, &applied);
            (Some(scrubbed), records)
        }
        None => (None, Vec::new()),
    };

    let raster = PageRaster::from_rgb8(page.width_px, page.height_px, canvas.into_raw())
        .expect("canvas dimensions unchanged");
    let fingerprint = page_fingerprint(&raster);

    RedactedPage {
        page_index: page.page_index,
        raster,
        scrubbed_spans,
        text_scrubs,
        fingerprint,
        redactions_applied: applied.len() as u32,
        degraded,
    }
}

impl RedactedPage {
    /// Full-page solid-black fallback for a page that could not be
    /// decoded (or missed its deadline). Produces a page the writer and
    /// the audit can treat like any other.
    pub fn full_page_fallback(page_index: u32, width_px: u32, height_px: u32) -> Self {
        let width = width_px.max(1);
        let height = height_px.max(1);
        let raster = PageRaster::from_rgb8(
            width,
            height,
            vec![0u8; width as usize * height as usize * 3],
        )
        .expect("constructed buffer matches dimensions");
        let fingerprint = page_fingerprint(&raster);
        RedactedPage {
            page_index,
            raster,
            scrubbed_spans: None,
            text_scrubs: Vec::new(),
            fingerprint,
            redactions_applied: 1,
            degraded: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profile_engine::{ProfileRegistry, RuleSpec};
    use shared_types::PiiKind;

    fn default_profile() -> EffectiveProfile {
        ProfileRegistry::with_builtins().resolve("default").unwrap()
    }

    fn gradient_page(width: u32, height: u32) -> PageView {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 77])
        });
        PageView::new(
            0,
            96,
            PageRaster::from_rgb8(width, height, img.into_raw()).unwrap(),
        )
    }

    fn face_at(bbox: BoundingBox, confidence: f64) -> Detection {
        Detection::visual(PiiKind::Face, 0, bbox, confidence, "face-model")
    }

    #[test]
    fn test_redacted_region_differs_from_input() {
        let page = gradient_page(100, 100);
        let bbox = BoundingBox::new(20, 20, 30, 30);
        let result = redact_page(&page, &[face_at(bbox, 0.9)], &default_profile());

        assert_eq!(result.redactions_applied, 1);
        let out = result.raster.as_bytes();
        let before = page.raster.as_bytes();
        let idx = (25 * 100 + 25) * 3;
        assert_ne!(&out[idx..idx + 3], &before[idx..idx + 3]);
        // Outside the box the page is untouched.
        let outside = (5 * 100 + 5) * 3;
        assert_eq!(&out[outside..outside + 3], &before[outside..outside + 3]);
    }

    #[test]
    fn test_input_raster_not_written_in_place() {
        let page = gradient_page(50, 50);
        let before = page.raster.to_vec();
        let _ = redact_page(
            &page,
            &[face_at(BoundingBox::new(0, 0, 50, 50), 0.9)],
            &default_profile(),
        );
        assert_eq!(page.raster.as_bytes(), &before[..]);
    }

    #[test]
    fn test_page_bounds_detection_blacks_whole_page() {
        let page = gradient_page(40, 40);
        let result = redact_page(
            &page,
            &[face_at(BoundingBox::new(0, 0, 40, 40), 0.9)],
            &default_profile(),
        );
        assert!(result.raster.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_overlap_order_last_write_wins() {
        // Two overlapping solid styles with different colors; the box
        // later in (y, x, kind) order must own the intersection.
        let mut profile = default_profile();
        profile.rules.insert(
            PiiKind::Face,
            RuleSpec {
                enabled: true,
                min_confidence: 0.5,
                style: Some(StyleSpec::Solid { color: [255, 0, 0] }),
            },
        );
        profile.rules.insert(
            PiiKind::Signature,
            RuleSpec {
                enabled: true,
                min_confidence: 0.5,
                style: Some(StyleSpec::Solid { color: [0, 0, 255] }),
            },
        );

        let page = gradient_page(100, 100);
        let face = face_at(BoundingBox::new(10, 10, 40, 40), 0.9);
        let signature = Detection::visual(
            PiiKind::Signature,
            0,
            BoundingBox::new(30, 30, 40, 40),
            0.9,
            "sig-model",
        );
        let result = redact_page(&page, &[face, signature], &profile);

        let out = result.raster.as_bytes();
        // Intersection pixel (35, 35): signature sorts later (y 30 > 10).
        let idx = (35 * 100 + 35) * 3;
        assert_eq!(&out[idx..idx + 3], &[0, 0, 255]);
        // Pixel owned by the face box alone.
        let idx = (15 * 100 + 15) * 3;
        assert_eq!(&out[idx..idx + 3], &[255, 0, 0]);
    }

    #[test]
    fn test_failed_style_degrades_to_solid_black() {
        let mut profile = default_profile();
        // A zero-block pixelate cannot render.
        profile.rules.insert(
            PiiKind::Face,
            RuleSpec {
                enabled: true,
                min_confidence: 0.5,
                style: Some(StyleSpec::Pixelate { block_px: 0 }),
            },
        );

        let page = gradient_page(60, 60);
        let bbox = BoundingBox::new(10, 10, 20, 20);
        let detection = face_at(bbox, 0.9);
        let detection_id = detection.id;
        let result = redact_page(&page, &[detection], &profile);

        assert_eq!(result.degraded.len(), 1);
        assert_eq!(result.degraded[0].detection_id, detection_id);
        assert_eq!(result.redactions_applied, 1);
        let idx = (15 * 60 + 15) * 3;
        assert_eq!(&result.raster.as_bytes()[idx..idx + 3], &[0, 0, 0]);
    }

    #[test]
    fn test_text_layer_scrubbed_with_redactions() {
        let spans = vec![
            TextSpan {
                text: "jane@example.com".into(),
                bbox: BoundingBox::new(10, 10, 160, 12),
                language: None,
                font_size: None,
                reading_order: 0,
            },
            TextSpan {
                text: "unrelated".into(),
                bbox: BoundingBox::new(10, 200, 90, 12),
                language: None,
                font_size: None,
                reading_order: 1,
            },
        ];
        let page = gradient_page(300, 300).with_text_spans(spans);
        let email = Detection::textual(
            PiiKind::Email,
            0,
            BoundingBox::new(10, 10, 160, 12),
            0.95,
            "jane@example.com",
            "pattern-text-v1",
        );

        let result = redact_page(&page, &[email], &default_profile());
        let scrubbed = result.scrubbed_spans.as_ref().unwrap();
        assert_eq!(scrubbed[0].text, "\u{25a0}".repeat(16));
        assert_eq!(scrubbed[1].text, "unrelated");
        assert_eq!(result.text_scrubs.len(), 1);
    }

    #[test]
    fn test_zero_detections_leave_page_identical() {
        let page = gradient_page(64, 64);
        let result = redact_page(&page, &[], &default_profile());
        assert_eq!(result.raster.as_bytes(), page.raster.as_bytes());
        assert_eq!(result.redactions_applied, 0);
        assert_eq!(result.fingerprint, page_fingerprint(&page.raster));
    }

    #[test]
    fn test_full_page_fallback_is_black() {
        let fallback = RedactedPage::full_page_fallback(3, 20, 10);
        assert_eq!(fallback.page_index, 3);
        assert!(fallback.raster.as_bytes().iter().all(|&b| b == 0));
        assert_eq!(fallback.redactions_applied, 1);
    }

    #[test]
    fn test_fingerprint_binds_output_not_input() {
        let page = gradient_page(50, 50);
        let result = redact_page(
            &page,
            &[face_at(BoundingBox::new(0, 0, 25, 25), 0.9)],
            &default_profile(),
        );
        assert_eq!(result.fingerprint, page_fingerprint(&result.raster));
        assert_ne!(result.fingerprint, page_fingerprint(&page.raster));
    }
}
