//! Text-layer scrubbing: preventing extraction leakage under redactions.

use serde::{Deserialize, Serialize};
use shared_types::{BoundingBox, TextSpan};

/// Neutral replacement glyph (U+25A0 BLACK SQUARE).
pub const REPLACEMENT_CHAR: char = '\u{25a0}';

/// A span is scrubbed when redactions cover at least this fraction of its
/// own area.
pub const SCRUB_OVERLAP_THRESHOLD: f64 = 0.2;

/// Record of one scrubbed span, carried into the audit record. Only
/// geometry and length survive; the original text does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextScrub {
    pub page_index: u32,
    pub reading_order: u32,
    pub bbox: BoundingBox,
    pub chars: u32,
}

/// Replace every span that a redaction bbox overlaps by at least the
/// threshold with an equal-length run of the replacement character.
///
/// Returns the scrubbed span list (same length and order as the input) and
/// the scrub records for the audit.
pub fn scrub_spans(
    page_index: u32,
    spans: &[TextSpan],
    redactions: &[BoundingBox],
) -> (Vec<TextSpan>, Vec<TextScrub>) {
    let mut scrubbed = Vec::with_capacity(spans.len());
    let mut records = Vec::new();

    for span in spans {
        let covered = redactions
            .iter()
            .any(|r| span.bbox.overlap_fraction(r) >= SCRUB_OVERLAP_THRESHOLD);
        if covered {
            let chars = span.text.chars().count();
            records.push(TextScrub {
                page_index,
                reading_order: span.reading_order,
                bbox: span.bbox,
                chars: chars as u32,
            });
            scrubbed.push(TextSpan {
                text: REPLACEMENT_CHAR.to_string().repeat(chars),
                ..span.clone()
            });
        } else {
            scrubbed.push(span.clone());
        }
    }

    (scrubbed, records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: u32, y: u32, w: u32, h: u32, order: u32) -> TextSpan {
        TextSpan {
            text: text.into(),
            bbox: BoundingBox::new(x, y, w, h),
            language: None,
            font_size: None,
            reading_order: order,
        }
    }

    #[test]
    fn test_covered_span_replaced_with_equal_length_run() {
        let spans = vec![span("jane@example.com", 10, 10, 160, 12, 0)];
        let redactions = vec![BoundingBox::new(10, 10, 160, 12)];

        let (scrubbed, records) = scrub_spans(0, &spans, &redactions);
        assert_eq!(scrubbed[0].text, "\u{25a0}".repeat(16));
        assert_eq!(scrubbed[0].text.chars().count(), 16);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].chars, 16);
    }

    #[test]
    fn test_threshold_is_inclusive_of_20_percent() {
        // Redaction covers exactly 20% of the span.
        let spans = vec![span("abcde", 0, 0, 100, 10, 0)];
        let at_threshold = vec![BoundingBox::new(0, 0, 20, 10)];
        let below = vec![BoundingBox::new(0, 0, 19, 10)];

        let (scrubbed, _) = scrub_spans(0, &spans, &at_threshold);
        assert!(scrubbed[0].text.starts_with('\u{25a0}'));

        let (untouched, records) = scrub_spans(0, &spans, &below);
        assert_eq!(untouched[0].text, "abcde");
        assert!(records.is_empty());
    }

    #[test]
    fn test_unrelated_spans_untouched() {
        let spans = vec![
            span("redact me", 0, 0, 90, 10, 0),
            span("keep me", 0, 500, 70, 10, 1),
        ];
        let redactions = vec![BoundingBox::new(0, 0, 90, 10)];

        let (scrubbed, records) = scrub_spans(0, &spans, &redactions);
        assert_ne!(scrubbed[0].text, "redact me");
        assert_eq!(scrubbed[1].text, "keep me");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reading_order, 0);
    }

    #[test]
    fn test_geometry_preserved_for_layout() {
        let spans = vec![span("secret", 30, 40, 60, 12, 3)];
        let redactions = vec![BoundingBox::new(20, 35, 100, 30)];

        let (scrubbed, _) = scrub_spans(0, &spans, &redactions);
        assert_eq!(scrubbed[0].bbox, spans[0].bbox);
        assert_eq!(scrubbed[0].reading_order, 3);
    }

    #[test]
    fn test_multibyte_text_length_counted_in_chars() {
        let spans = vec![span("山田太郎", 0, 0, 80, 14, 0)];
        let redactions = vec![BoundingBox::new(0, 0, 80, 14)];

        let (scrubbed, records) = scrub_spans(0, &spans, &redactions);
        assert_eq!(scrubbed[0].text.chars().count(), 4);
        assert_eq!(records[0].chars, 4);
    }
}
