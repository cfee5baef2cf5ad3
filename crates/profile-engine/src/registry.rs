//! Flat-map profile registry and inheritance resolution.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use shared_types::PiiKind;

use crate::builtin;
use crate::model::{RedactionProfile, RuleSpec};
use crate::style::StyleSpec;
use crate::ProfileError;

/// Named profiles, stored flat; inheritance is resolved on demand and never
/// mutates the stored profiles.
#[derive(Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, RedactionProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in `default` and `healthcare`
    /// profiles.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register(builtin::default_profile())
            .expect("built-in default profile is valid");
        registry
            .register(builtin::healthcare_profile())
            .expect("built-in healthcare profile is valid");
        registry
    }

    pub fn register(&mut self, profile: RedactionProfile) -> Result<(), ProfileError> {
        profile.validate()?;
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RedactionProfile> {
        self.profiles.get(name)
    }

    /// Resolve a profile and its inheritance chain into an immutable
    /// [`EffectiveProfile`].
    ///
    /// Merging is deep, base-to-child, with child keys overriding; conflicts
    /// resolve to the nearest ancestor. Every override and every
    /// floor-clamp is recorded in `precedence_notes` so the resolution can
    /// be reproduced from the audit record alone.
    pub fn resolve(&self, name: &str) -> Result<EffectiveProfile, ProfileError> {
        // Child-to-root chain with cycle detection.
        let mut chain: Vec<&RedactionProfile> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut cursor = Some(name);

        while let Some(current) = cursor {
            if !seen.insert(current) {
                let mut names: Vec<&str> = chain.iter().map(|p| p.name.as_str()).collect();
                names.push(current);
                return Err(ProfileError::InheritanceCycle {
                    chain: names.join(" -> "),
                });
            }
            let profile = self.profiles.get(current).ok_or_else(|| {
                if chain.is_empty() {
                    ProfileError::UnknownProfile(current.to_string())
                } else {
                    ProfileError::UnknownBase {
                        profile: chain.last().unwrap().name.clone(),
                        base: current.to_string(),
                    }
                }
            })?;
            chain.push(profile);
            cursor = profile.base.as_deref();
        }

        let child = chain[0];
        let mut notes: Vec<String> = Vec::new();
        let mut rules: BTreeMap<PiiKind, RuleSpec> = BTreeMap::new();
        let mut default_style: Option<(StyleSpec, &str)> = None;
        let mut confidence_floor: Option<(f64, &str)> = None;
        let mut languages: Option<(Vec<String>, &str)> = None;

        // Merge root ancestor first so child-most assignments win.
        for profile in chain.iter().rev() {
            for (kind, rule) in profile.typed_rules() {
                if rules.insert(kind, rule).is_some() {
                    notes.push(format!(
                        "rule for '{}' overridden by '{}'",
                        kind.tag(),
                        profile.name
                    ));
                }
            }
            if let Some(style) = &profile.default_style {
                if let Some((_, origin)) = &default_style {
                    notes.push(format!(
                        "default_style from '{}' overridden by '{}'",
                        origin, profile.name
                    ));
                }
                default_style = Some((style.clone(), profile.name.as_str()));
            }
            if let Some(floor) = profile.confidence_floor {
                if let Some((_, origin)) = &confidence_floor {
                    notes.push(format!(
                        "confidence_floor from '{}' overridden by '{}'",
                        origin, profile.name
                    ));
                }
                confidence_floor = Some((floor, profile.name.as_str()));
            }
            if let Some(langs) = &profile.languages {
                if let Some((_, origin)) = &languages {
                    notes.push(format!(
                        "languages from '{}' overridden by '{}'",
                        origin, profile.name
                    ));
                }
                languages = Some((langs.clone(), profile.name.as_str()));
            }
        }

        let floor = confidence_floor.map(|(f, _)| f).unwrap_or(0.0);

        // Clamp enabled rules up to the floor.
        for (kind, rule) in rules.iter_mut() {
            if rule.enabled && rule.min_confidence < floor {
                notes.push(format!(
                    "min_confidence for '{}' clamped from {} to floor {}",
                    kind.tag(),
                    rule.min_confidence,
                    floor
                ));
                rule.min_confidence = floor;
            }
        }

        // Total rule map: kinds never mentioned resolve to disabled.
        let mut total: BTreeMap<PiiKind, RuleSpec> = BTreeMap::new();
        for kind in PiiKind::ALL {
            total.insert(
                kind,
                rules.get(&kind).cloned().unwrap_or_else(RuleSpec::disabled),
            );
        }

        Ok(EffectiveProfile {
            name: child.name.clone(),
            version: child.version.clone(),
            description: child.description.clone(),
            rules: total,
            default_style: default_style
                .map(|(s, _)| s)
                .unwrap_or_else(StyleSpec::solid_black),
            confidence_floor: floor,
            languages: languages.map(|(l, _)| l),
            precedence_notes: notes,
        })
    }
}

/// A fully resolved, immutable profile. Safe to share across workers and
/// inlined verbatim into audit records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveProfile {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Total map: every kind of the closed enumeration has an entry.
    pub rules: BTreeMap<PiiKind, RuleSpec>,
    pub default_style: StyleSpec,
    pub confidence_floor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precedence_notes: Vec<String>,
}

impl EffectiveProfile {
    /// Deterministic, pure rule lookup; total over all kinds.
    pub fn effective_rule(&self, kind: PiiKind) -> &RuleSpec {
        &self.rules[&kind]
    }

    /// The rendering style for a kind: its rule's style, else the profile
    /// default.
    pub fn style_for(&self, kind: PiiKind) -> &StyleSpec {
        self.rules[&kind]
            .style
            .as_ref()
            .unwrap_or(&self.default_style)
    }

    pub fn enabled_kinds(&self) -> impl Iterator<Item = PiiKind> + '_ {
        self.rules
            .iter()
            .filter(|(_, rule)| rule.enabled)
            .map(|(kind, _)| *kind)
    }

    /// Language allow-list check; an absent list allows everything, and
    /// detections with no language tag are always kept.
    pub fn allows_language(&self, language: Option<&str>) -> bool {
        match (&self.languages, language) {
            (Some(allowed), Some(lang)) => allowed.iter().any(|l| l == lang),
            _ => true,
        }
    }
}
