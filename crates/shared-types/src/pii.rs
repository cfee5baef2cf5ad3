//! PII kinds and detection records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::BoundingBox;

/// Closed enumeration of detectable PII kinds.
///
/// The snake_case tag of each kind is stable: it is the spelling used in
/// redaction profiles, log events, and persisted audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    // Visual kinds
    Face,
    Signature,
    Barcode,
    QrCode,
    PhotoIdPortrait,
    // Textual kinds
    PersonName,
    Email,
    Phone,
    PostalAddress,
    NationalId,
    MedicalRecordNumber,
    FinancialAccount,
    DateOfBirth,
    IpAddress,
    LicensePlate,
}

impl PiiKind {
    /// Every kind, visual first, in declaration order.
    pub const ALL: [PiiKind; 15] = [
        PiiKind::Face,
        PiiKind::Signature,
        PiiKind::Barcode,
        PiiKind::QrCode,
        PiiKind::PhotoIdPortrait,
        PiiKind::PersonName,
        PiiKind::Email,
        PiiKind::Phone,
        PiiKind::PostalAddress,
        PiiKind::NationalId,
        PiiKind::MedicalRecordNumber,
        PiiKind::FinancialAccount,
        PiiKind::DateOfBirth,
        PiiKind::IpAddress,
        PiiKind::LicensePlate,
    ];

    /// Stable string tag.
    pub fn tag(&self) -> &'static str {
        match self {
            PiiKind::Face => "face",
            PiiKind::Signature => "signature",
            PiiKind::Barcode => "barcode",
            PiiKind::QrCode => "qr_code",
            PiiKind::PhotoIdPortrait => "photo_id_portrait",
            PiiKind::PersonName => "person_name",
            PiiKind::Email => "email",
            PiiKind::Phone => "phone",
            PiiKind::PostalAddress => "postal_address",
            PiiKind::NationalId => "national_id",
            PiiKind::MedicalRecordNumber => "medical_record_number",
            PiiKind::FinancialAccount => "financial_account",
            PiiKind::DateOfBirth => "date_of_birth",
            PiiKind::IpAddress => "ip_address",
            PiiKind::LicensePlate => "license_plate",
        }
    }

    /// Parse a stable tag back into a kind.
    pub fn from_tag(tag: &str) -> Option<PiiKind> {
        PiiKind::ALL.iter().copied().find(|k| k.tag() == tag)
    }

    /// Kinds located by pixel evidence (faces, signatures, codes).
    pub fn is_visual(&self) -> bool {
        matches!(
            self,
            PiiKind::Face
                | PiiKind::Signature
                | PiiKind::Barcode
                | PiiKind::QrCode
                | PiiKind::PhotoIdPortrait
        )
    }

    /// Kinds located by textual evidence.
    pub fn is_textual(&self) -> bool {
        !self.is_visual()
    }
}

/// Which evidence stream produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    Visual,
    Textual,
    /// Produced by merging two or more inputs during fusion.
    Fused,
}

/// A localized claim that a page region contains PII of a specific kind.
///
/// Detections are value objects: after fusion they are never mutated in
/// place, transformations always produce new records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: Uuid,
    pub kind: PiiKind,
    pub page_index: u32,
    pub bbox: BoundingBox,
    /// Finite, in `[0, 1]`.
    pub confidence: f64,
    pub source: DetectionSource,
    /// Matched text for textual detections; never logged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Opaque model + version identifier of the producing detector.
    pub model_tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl Detection {
    pub fn visual(
        kind: PiiKind,
        page_index: u32,
        bbox: BoundingBox,
        confidence: f64,
        model_tag: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            page_index,
            bbox,
            confidence,
            source: DetectionSource::Visual,
            text: None,
            language: None,
            model_tag: model_tag.into(),
            extras: BTreeMap::new(),
        }
    }

    pub fn textual(
        kind: PiiKind,
        page_index: u32,
        bbox: BoundingBox,
        confidence: f64,
        text: impl Into<String>,
        model_tag: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            page_index,
            bbox,
            confidence,
            source: DetectionSource::Textual,
            text: Some(text.into()),
            language: None,
            model_tag: model_tag.into(),
            extras: BTreeMap::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Confidence is finite and within the unit interval.
    pub fn has_valid_confidence(&self) -> bool {
        self.confidence.is_finite() && (0.0..=1.0).contains(&self.confidence)
    }

    /// The detector reported a kind consistent with its evidence stream.
    pub fn kind_matches_source(&self) -> bool {
        match self.source {
            DetectionSource::Visual => self.kind.is_visual(),
            DetectionSource::Textual => self.kind.is_textual(),
            DetectionSource::Fused => true,
        }
    }

    /// Key for the pipeline-wide deterministic ordering
    /// `(page_index, bbox.y, bbox.x, kind tag)`.
    pub fn ordering_key(&self) -> (u32, u32, u32, &'static str) {
        (self.page_index, self.bbox.y, self.bbox.x, self.kind.tag())
    }
}

/// Sort detections into the pipeline-wide deterministic order.
pub fn sort_detections(detections: &mut [Detection]) {
    detections.sort_by_key(|d| d.ordering_key());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip_all_kinds() {
        for kind in PiiKind::ALL {
            assert_eq!(PiiKind::from_tag(kind.tag()), Some(kind));
        }
    }

    #[test]
    fn test_serde_tag_matches_stable_tag() {
        for kind in PiiKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.tag()));
        }
    }

    #[test]
    fn test_visual_textual_partition() {
        let visual = PiiKind::ALL.iter().filter(|k| k.is_visual()).count();
        let textual = PiiKind::ALL.iter().filter(|k| k.is_textual()).count();
        assert_eq!(visual, 5);
        assert_eq!(textual, 10);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(PiiKind::from_tag("social_graph"), None);
    }

    #[test]
    fn test_kind_matches_source() {
        let d = Detection::visual(
            PiiKind::Face,
            0,
            BoundingBox::new(0, 0, 10, 10),
            0.9,
            "fixture",
        );
        assert!(d.kind_matches_source());

        let mut wrong = d.clone();
        wrong.kind = PiiKind::Email;
        assert!(!wrong.kind_matches_source());
    }

    #[test]
    fn test_ordering_key_sorts_reading_order() {
        let mk = |page, y, x| {
            Detection::visual(
                PiiKind::Face,
                page,
                BoundingBox::new(x, y, 5, 5),
                0.9,
                "fixture",
            )
        };
        let mut dets = vec![mk(1, 0, 0), mk(0, 50, 10), mk(0, 10, 90), mk(0, 10, 5)];
        sort_detections(&mut dets);
        let keys: Vec<_> = dets.iter().map(|d| (d.page_index, d.bbox.y, d.bbox.x)).collect();
        assert_eq!(keys, vec![(0, 10, 5), (0, 10, 90), (0, 50, 10), (1, 0, 0)]);
    }

    #[test]
    fn test_confidence_validation() {
        let mut d = Detection::visual(
            PiiKind::Face,
            0,
            BoundingBox::new(0, 0, 10, 10),
            0.5,
            "fixture",
        );
        assert!(d.has_valid_confidence());
        d.confidence = f64::NAN;
        assert!(!d.has_valid_confidence());
        d.confidence = 1.2;
        assert!(!d.has_valid_confidence());
    }
}
