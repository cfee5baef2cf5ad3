//! Built-in profiles.

use std::collections::BTreeMap;

use shared_types::PiiKind;

use crate::model::{RedactionProfile, RuleSpec};
use crate::style::StyleSpec;

fn rules(entries: &[(PiiKind, f64)]) -> BTreeMap<String, RuleSpec> {
    entries
        .iter()
        .map(|(kind, min_confidence)| {
            (kind.tag().to_string(), RuleSpec::enabled_at(*min_confidence))
        })
        .collect()
}

/// General-purpose profile: common identity kinds at 0.7, solid black.
pub fn default_profile() -> RedactionProfile {
    RedactionProfile {
        name: "default".into(),
        version: "1".into(),
        description: Some("General-purpose redaction of common identity kinds".into()),
        base: None,
        pii_rules: rules(&[
            (PiiKind::Face, 0.7),
            (PiiKind::Signature, 0.7),
            (PiiKind::PersonName, 0.7),
            (PiiKind::Email, 0.7),
            (PiiKind::Phone, 0.7),
            (PiiKind::PostalAddress, 0.7),
            (PiiKind::NationalId, 0.85),
        ]),
        default_style: Some(StyleSpec::solid_black()),
        confidence_floor: Some(0.5),
        languages: None,
    }
}

/// Healthcare profile: inherits `default`, tightens identifiers, and adds
/// medical record numbers and birth dates.
pub fn healthcare_profile() -> RedactionProfile {
    RedactionProfile {
        name: "healthcare".into(),
        version: "1".into(),
        description: Some("HIPAA-oriented redaction for clinical documents".into()),
        base: Some("default".into()),
        pii_rules: rules(&[
            (PiiKind::NationalId, 0.9),
            (PiiKind::MedicalRecordNumber, 0.85),
            (PiiKind::DateOfBirth, 0.8),
            (PiiKind::FinancialAccount, 0.85),
        ]),
        default_style: None,
        confidence_floor: Some(0.6),
        languages: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProfileRegistry;

    #[test]
    fn test_builtins_validate() {
        assert!(default_profile().validate().is_ok());
        assert!(healthcare_profile().validate().is_ok());
    }

    #[test]
    fn test_default_enables_s1_kinds() {
        let registry = ProfileRegistry::with_builtins();
        let effective = registry.resolve("default").unwrap();
        for kind in [PiiKind::PersonName, PiiKind::Email, PiiKind::Phone] {
            let rule = effective.effective_rule(kind);
            assert!(rule.enabled, "{} should be enabled", kind.tag());
            assert_eq!(rule.min_confidence, 0.7);
        }
        assert_eq!(effective.default_style, StyleSpec::solid_black());
    }

    #[test]
    fn test_healthcare_inherits_and_tightens() {
        let registry = ProfileRegistry::with_builtins();
        let effective = registry.resolve("healthcare").unwrap();

        // Tightened over the base's 0.85.
        assert_eq!(
            effective.effective_rule(PiiKind::NationalId).min_confidence,
            0.9
        );
        // Added kind.
        assert!(effective.effective_rule(PiiKind::MedicalRecordNumber).enabled);
        // Inherited from default.
        assert!(effective.effective_rule(PiiKind::Email).enabled);
        // Base floor overridden.
        assert_eq!(effective.confidence_floor, 0.6);
    }
}
