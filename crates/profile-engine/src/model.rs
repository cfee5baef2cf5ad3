//! Profile file model: the structure parsed from YAML/JSON.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use shared_types::PiiKind;

use crate::style::StyleSpec;
use crate::ProfileError;

fn default_enabled() -> bool {
    true
}

fn default_min_confidence() -> f64 {
    0.7
}

/// Per-kind redaction rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Inclusive threshold: a detection at exactly this confidence is kept.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Rendering style; falls back to the profile's `default_style`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleSpec>,
}

impl RuleSpec {
    pub fn enabled_at(min_confidence: f64) -> Self {
        Self {
            enabled: true,
            min_confidence,
            style: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            min_confidence: 1.0,
            style: None,
        }
    }
}

/// A redaction profile as written in its YAML/JSON file.
///
/// Unknown top-level options and unknown rule fields are rejected at load
/// time with the serde diagnostic naming the offending key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedactionProfile {
    pub name: String,
    #[serde(default = "RedactionProfile::default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parent profile for inheritance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Keys are PII kind tags; validated against the closed enumeration.
    #[serde(default)]
    pub pii_rules: BTreeMap<String, RuleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_style: Option<StyleSpec>,
    /// Global lower bound; rules below it are clamped upward at resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_floor: Option<f64>,
    /// Allow-list of language tags for text detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,
}

impl RedactionProfile {
    fn default_version() -> String {
        "1".to_string()
    }

    pub fn from_yaml_str(input: &str) -> Result<Self, ProfileError> {
        let profile: RedactionProfile =
            serde_yaml::from_str(input).map_err(|e| ProfileError::Parse(e.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_json_str(input: &str) -> Result<Self, ProfileError> {
        let profile: RedactionProfile =
            serde_json::from_str(input).map_err(|e| ProfileError::Parse(e.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Load from a file, dispatching on extension (`.yaml`/`.yml`/`.json`).
    pub fn from_path(path: &Path) -> Result<Self, ProfileError> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            Some("json") => Self::from_json_str(&text),
            other => Err(ProfileError::Parse(format!(
                "unrecognized profile extension {:?}",
                other
            ))),
        }
    }

    pub fn to_yaml(&self) -> Result<String, ProfileError> {
        serde_yaml::to_string(self).map_err(|e| ProfileError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ProfileError> {
        serde_json::to_string_pretty(self).map_err(|e| ProfileError::Parse(e.to_string()))
    }

    /// Structural validation of a single profile (inheritance is checked at
    /// registry resolution).
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.name.is_empty() {
            return Err(ProfileError::Parse("profile name cannot be empty".into()));
        }

        for (tag, rule) in &self.pii_rules {
            if PiiKind::from_tag(tag).is_none() {
                return Err(ProfileError::UnknownKind {
                    profile: self.name.clone(),
                    tag: tag.clone(),
                });
            }
            if !rule.min_confidence.is_finite() || !(0.0..=1.0).contains(&rule.min_confidence) {
                return Err(ProfileError::ConfidenceOutOfRange {
                    profile: self.name.clone(),
                    field: format!("pii_rules.{}.min_confidence", tag),
                    value: rule.min_confidence,
                });
            }
            if let Some(style) = &rule.style {
                style.validate().map_err(|detail| ProfileError::InvalidStyle {
                    profile: self.name.clone(),
                    detail,
                })?;
            }
        }

        if let Some(floor) = self.confidence_floor {
            if !floor.is_finite() || !(0.0..=1.0).contains(&floor) {
                return Err(ProfileError::ConfidenceOutOfRange {
                    profile: self.name.clone(),
                    field: "confidence_floor".into(),
                    value: floor,
                });
            }
        }

        if let Some(style) = &self.default_style {
            style.validate().map_err(|detail| ProfileError::InvalidStyle {
                profile: self.name.clone(),
                detail,
            })?;
        }

        Ok(())
    }

    /// Typed view of `pii_rules`; call after [`validate`](Self::validate).
    pub fn typed_rules(&self) -> BTreeMap<PiiKind, RuleSpec> {
        self.pii_rules
            .iter()
            .filter_map(|(tag, rule)| PiiKind::from_tag(tag).map(|kind| (kind, rule.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEALTHCARE_YAML: &str = r#"
name: healthcare
version: "2024.1"
base: default
pii_rules:
  national_id:
    enabled: true
    min_confidence: 0.9
  medical_record_number:
    enabled: true
    min_confidence: 0.85
    style:
      type: pixelate
      block_px: 16
confidence_floor: 0.5
languages: [en, de]
"#;

    #[test]
    fn test_yaml_load() {
        let profile = RedactionProfile::from_yaml_str(HEALTHCARE_YAML).unwrap();
        assert_eq!(profile.name, "healthcare");
        assert_eq!(profile.base.as_deref(), Some("default"));
        assert_eq!(profile.pii_rules["national_id"].min_confidence, 0.9);
        assert_eq!(
            profile.pii_rules["medical_record_number"].style,
            Some(StyleSpec::Pixelate { block_px: 16 })
        );
        assert_eq!(profile.confidence_floor, Some(0.5));
    }

    #[test]
    fn test_json_load_matches_yaml() {
        let from_yaml = RedactionProfile::from_yaml_str(HEALTHCARE_YAML).unwrap();
        let json = from_yaml.to_json().unwrap();
        let from_json = RedactionProfile::from_json_str(&json).unwrap();
        assert_eq!(from_yaml, from_json);
    }

    #[test]
    fn test_yaml_round_trip() {
        let profile = RedactionProfile::from_yaml_str(HEALTHCARE_YAML).unwrap();
        let reloaded = RedactionProfile::from_yaml_str(&profile.to_yaml().unwrap()).unwrap();
        assert_eq!(profile, reloaded);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let yaml = "name: broken\npii_rules:\n  passport_stamp:\n    enabled: true\n";
        match RedactionProfile::from_yaml_str(yaml) {
            Err(ProfileError::UnknownKind { tag, .. }) => assert_eq!(tag, "passport_stamp"),
            other => panic!("expected UnknownKind, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_top_level_option_rejected() {
        let yaml = "name: broken\nredaction_speed: fast\n";
        assert!(matches!(
            RedactionProfile::from_yaml_str(yaml),
            Err(ProfileError::Parse(_))
        ));
    }

    #[test]
    fn test_out_of_range_confidence_rejected() {
        let yaml = "name: broken\npii_rules:\n  email:\n    min_confidence: 1.5\n";
        assert!(matches!(
            RedactionProfile::from_yaml_str(yaml),
            Err(ProfileError::ConfidenceOutOfRange { .. })
        ));
    }

    #[test]
    fn test_invalid_style_parameter_rejected() {
        let yaml = "name: broken\ndefault_style:\n  type: blur\n  radius_px: 0\n  iterations: 2\n";
        assert!(matches!(
            RedactionProfile::from_yaml_str(yaml),
            Err(ProfileError::InvalidStyle { .. })
        ));
    }

    #[test]
    fn test_rule_defaults() {
        let yaml = "name: minimal\npii_rules:\n  email: {}\n";
        let profile = RedactionProfile::from_yaml_str(yaml).unwrap();
        let rule = &profile.pii_rules["email"];
        assert!(rule.enabled);
        assert_eq!(rule.min_confidence, 0.7);
        assert!(rule.style.is_none());
    }
}
