//! Hybrid fusion: one profile-filtered, non-redundant detection set per
//! page.
//!
//! Visual and textual detections describing the same underlying PII
//! instance are grouped by overlap and merged into a single
//! representative. Grouping is member-pairwise (connected components),
//! followed by a same-kind overlap sweep so no two emitted detections of
//! one kind ever exceed the dedup threshold.

use std::collections::BTreeSet;

use profile_engine::EffectiveProfile;
use shared_types::{sort_detections, BoundingBox, Detection, DetectionSource, PiiKind};
use uuid::Uuid;

/// Same-kind detections at or above this IoU describe one instance.
const IOU_THRESHOLD: f64 = 0.5;

/// A textual span covered by a visual box at or above this fraction of its
/// own area co-locates with it.
const CONTAINMENT_THRESHOLD: f64 = 0.7;

/// Headroom above the strongest member when combining confidences.
const CONFIDENCE_MARGIN: f64 = 0.05;

/// Visual kinds a textual kind may co-locate with (a printed name inside a
/// detected face or signature region is the same PII instance).
fn kinds_colocate(visual: PiiKind, textual: PiiKind) -> bool {
    matches!(
        (visual, textual),
        (
            PiiKind::Face | PiiKind::PhotoIdPortrait | PiiKind::Signature,
            PiiKind::PersonName
        )
    )
}

fn equivalent(a: &Detection, b: &Detection) -> bool {
    if a.page_index != b.page_index {
        return false;
    }
    if a.kind == b.kind {
        return a.bbox.iou(&b.bbox) >= IOU_THRESHOLD;
    }
    let (visual, textual) = match (a.source, b.source) {
        (DetectionSource::Visual, DetectionSource::Textual) => (a, b),
        (DetectionSource::Textual, DetectionSource::Visual) => (b, a),
        _ => return false,
    };
    kinds_colocate(visual.kind, textual.kind)
        && textual.bbox.overlap_fraction(&visual.bbox) >= CONTAINMENT_THRESHOLD
}

/// Noisy-or of member confidences, capped just above the strongest member.
fn combined_confidence(confidences: &[f64]) -> f64 {
    let noisy_or = 1.0 - confidences.iter().fold(1.0, |acc, c| acc * (1.0 - c));
    let cap = confidences
        .iter()
        .fold(0.0f64, |max, &c| max.max(c))
        + CONFIDENCE_MARGIN;
    noisy_or.min(cap).min(1.0)
}

/// Stable id for a merged detection, derived from what was merged.
fn fused_id(kind: PiiKind, page_index: u32, bbox: BoundingBox, members: &[&Detection]) -> Uuid {
    let mut seed = format!(
        "{}:{}:{},{},{},{}",
        kind.tag(),
        page_index,
        bbox.x,
        bbox.y,
        bbox.width,
        bbox.height
    );
    let mut member_ids: Vec<String> = members.iter().map(|m| m.id.to_string()).collect();
    member_ids.sort();
    for id in member_ids {
        seed.push(':');
        seed.push_str(&id);
    }
    Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes())
}

fn merge_group(members: &[&Detection]) -> Detection {
    debug_assert!(!members.is_empty());
    if members.len() == 1 {
        return members[0].clone();
    }

    let bbox = members
        .iter()
        .skip(1)
        .fold(members[0].bbox, |acc, m| acc.union_with(&m.bbox));
    let confidences: Vec<f64> = members.iter().map(|m| m.confidence).collect();
    let confidence = combined_confidence(&confidences);

    let sources: BTreeSet<DetectionSource> = members.iter().map(|m| m.source).collect();
    let source = if sources.len() >= 2 {
        DetectionSource::Fused
    } else {
        members[0].source
    };

    // Ties prefer the textual member (it carries the text) and then the
    // earlier position in reading order.
    let mut textual: Vec<&Detection> = members
        .iter()
        .copied()
        .filter(|m| m.source == DetectionSource::Textual)
        .collect();
    textual.sort_by_key(|m| m.ordering_key());
    let primary_textual = textual.first().copied();

    // Cross-modal groups take the kind of the strongest visual member: the
    // visual region is what gets painted over.
    let kinds: BTreeSet<PiiKind> = members.iter().map(|m| m.kind).collect();
    let kind = if kinds.len() == 1 {
        members[0].kind
    } else {
        members
            .iter()
            .filter(|m| m.source == DetectionSource::Visual)
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.ordering_key().cmp(&a.ordering_key()))
            })
            .map(|m| m.kind)
            .unwrap_or(members[0].kind)
    };

    let mut model_tags: Vec<&str> = members.iter().map(|m| m.model_tag.as_str()).collect();
    model_tags.sort();
    model_tags.dedup();

    let page_index = members[0].page_index;
    Detection {
        id: fused_id(kind, page_index, bbox, members),
        kind,
        page_index,
        bbox,
        confidence,
        source,
        text: primary_textual.and_then(|m| m.text.clone()),
        language: primary_textual.and_then(|m| m.language.clone()),
        model_tag: model_tags.join("+"),
        extras: Default::default(),
    }
}

fn connected_components(detections: &[Detection]) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..detections.len()).collect();

    fn find(parent: &mut Vec<usize>, i: usize) -> usize {
        let mut root = i;
        while parent[root] != root {
            root = parent[root];
        }
        let mut cursor = i;
        while parent[cursor] != root {
            let next = parent[cursor];
            parent[cursor] = root;
            cursor = next;
        }
        root
    }

    for i in 0..detections.len() {
        for j in (i + 1)..detections.len() {
            if equivalent(&detections[i], &detections[j]) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }

    let mut groups: std::collections::BTreeMap<usize, Vec<usize>> = Default::default();
    for i in 0..detections.len() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }
    groups.into_values().collect()
}

/// Fuse one page's sanitized detections under the effective profile.
///
/// Filtering applies the enable flag, the (inclusive) per-kind confidence
/// threshold, and the profile's language allow-list; grouping and merging
/// follow the equivalence rules above; output order is the pipeline-wide
/// `(page, y, x, kind)` order.
pub fn fuse_page(detections: Vec<Detection>, profile: &EffectiveProfile) -> Vec<Detection> {
    let filtered: Vec<Detection> = detections
        .into_iter()
        .filter(|d| {
            let rule = profile.effective_rule(d.kind);
            if !rule.enabled || d.confidence < rule.min_confidence {
                return false;
            }
            if d.source == DetectionSource::Textual
                && !profile.allows_language(d.language.as_deref())
            {
                return false;
            }
            true
        })
        .collect();

    let mut merged: Vec<Detection> = connected_components(&filtered)
        .into_iter()
        .map(|group| {
            let members: Vec<&Detection> = group.iter().map(|&i| &filtered[i]).collect();
            merge_group(&members)
        })
        .collect();

    // Same-kind overlap sweep: union bboxes from distinct groups can still
    // collide, and no two emitted detections of one kind may overlap at or
    // above the dedup threshold.
    loop {
        let mut merge_pair: Option<(usize, usize)> = None;
        'outer: for i in 0..merged.len() {
            for j in (i + 1)..merged.len() {
                if merged[i].kind == merged[j].kind
                    && merged[i].page_index == merged[j].page_index
                    && merged[i].bbox.iou(&merged[j].bbox) >= IOU_THRESHOLD
                {
                    merge_pair = Some((i, j));
                    break 'outer;
                }
            }
        }
        match merge_pair {
            Some((i, j)) => {
                let b = merged.remove(j);
                let a = merged.remove(i);
                merged.push(merge_group(&[&a, &b]));
            }
            None => break,
        }
    }

    sort_detections(&mut merged);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use profile_engine::ProfileRegistry;

    fn default_profile() -> EffectiveProfile {
        ProfileRegistry::with_builtins().resolve("default").unwrap()
    }

    fn face(x: u32, y: u32, w: u32, h: u32, confidence: f64) -> Detection {
        Detection::visual(
            PiiKind::Face,
            0,
            BoundingBox::new(x, y, w, h),
            confidence,
            "face-model-v2",
        )
    }

    fn name(x: u32, y: u32, w: u32, h: u32, confidence: f64) -> Detection {
        Detection::textual(
            PiiKind::PersonName,
            0,
            BoundingBox::new(x, y, w, h),
            confidence,
            "Jane Doe",
            "pattern-text-v1",
        )
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let profile = default_profile();
        // default profile keeps faces at exactly 0.7.
        let kept = fuse_page(vec![face(0, 0, 10, 10, 0.7)], &profile);
        assert_eq!(kept.len(), 1);

        let dropped = fuse_page(vec![face(0, 0, 10, 10, 0.699)], &profile);
        assert!(dropped.is_empty());
    }

    #[test]
    fn test_disabled_kind_dropped() {
        let profile = default_profile();
        let barcode = Detection::visual(
            PiiKind::Barcode,
            0,
            BoundingBox::new(0, 0, 50, 50),
            0.99,
            "code-model",
        );
        assert!(fuse_page(vec![barcode], &profile).is_empty());
    }

    #[test]
    fn test_same_kind_overlap_merges() {
        let profile = default_profile();
        let fused = fuse_page(
            vec![face(10, 10, 100, 100, 0.8), face(20, 20, 100, 100, 0.75)],
            &profile,
        );

        assert_eq!(fused.len(), 1);
        let merged = &fused[0];
        assert_eq!(merged.bbox, BoundingBox::new(10, 10, 110, 110));
        // Both members were visual: source is inherited, not fused.
        assert_eq!(merged.source, DetectionSource::Visual);
        // Noisy-or 0.95 capped at 0.8 + 0.05.
        assert!((merged.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_same_kind_stays_separate() {
        let profile = default_profile();
        let fused = fuse_page(
            vec![face(0, 0, 40, 40, 0.8), face(500, 500, 40, 40, 0.8)],
            &profile,
        );
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_cross_modal_colocation_fuses() {
        let profile = default_profile();
        // Printed name fully inside the face region.
        let fused = fuse_page(
            vec![face(100, 100, 200, 200, 0.9), name(120, 150, 100, 20, 0.8)],
            &profile,
        );

        assert_eq!(fused.len(), 1);
        let merged = &fused[0];
        assert_eq!(merged.source, DetectionSource::Fused);
        assert_eq!(merged.kind, PiiKind::Face);
        assert_eq!(merged.bbox, BoundingBox::new(100, 100, 200, 200));
        assert_eq!(merged.text.as_deref(), Some("Jane Doe"));
        // Both producing models are recorded.
        assert_eq!(merged.model_tag, "face-model-v2+pattern-text-v1");
    }

    #[test]
    fn test_cross_modal_needs_containment() {
        let profile = default_profile();
        // Name mostly outside the face box: under the containment bar.
        let fused = fuse_page(
            vec![face(100, 100, 100, 100, 0.9), name(180, 120, 100, 20, 0.8)],
            &profile,
        );
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_unrelated_kinds_do_not_colocate() {
        let profile = default_profile();
        let email = Detection::textual(
            PiiKind::Email,
            0,
            BoundingBox::new(120, 150, 100, 20),
            0.9,
            "a@b.io",
            "pattern-text-v1",
        );
        let fused = fuse_page(vec![face(100, 100, 200, 200, 0.9), email], &profile);
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_singleton_passes_through_unchanged() {
        let profile = default_profile();
        let single = face(5, 5, 30, 30, 0.91);
        let id = single.id;
        let fused = fuse_page(vec![single], &profile);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].id, id);
        assert!((fused[0].confidence - 0.91).abs() < 1e-12);
    }

    #[test]
    fn test_no_same_kind_overlap_survives() {
        let profile = default_profile();
        // A chain: a~b and b~c but a!~c; transitive grouping must still
        // leave no overlapping pair behind.
        let fused = fuse_page(
            vec![
                face(0, 0, 100, 100, 0.8),
                face(30, 0, 100, 100, 0.8),
                face(60, 0, 100, 100, 0.8),
            ],
            &profile,
        );
        for i in 0..fused.len() {
            for j in (i + 1)..fused.len() {
                assert!(fused[i].bbox.iou(&fused[j].bbox) < IOU_THRESHOLD);
            }
        }
    }

    #[test]
    fn test_output_order_is_deterministic() {
        let profile = default_profile();
        let fused = fuse_page(
            vec![
                face(300, 200, 40, 40, 0.8),
                face(10, 200, 40, 40, 0.8),
                face(10, 20, 40, 40, 0.8),
            ],
            &profile,
        );
        let positions: Vec<(u32, u32)> = fused.iter().map(|d| (d.bbox.y, d.bbox.x)).collect();
        assert_eq!(positions, vec![(20, 10), (200, 10), (200, 300)]);
    }

    #[test]
    fn test_fused_id_is_deterministic() {
        let profile = default_profile();
        let run = || {
            let mut a = face(100, 100, 200, 200, 0.9);
            let mut b = name(120, 150, 100, 20, 0.8);
            // Pin the member ids so both runs merge identical inputs.
            a.id = Uuid::nil();
            b.id = Uuid::from_u128(1);
            fuse_page(vec![a, b], &profile)[0].id
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_language_allow_list_filters_textual() {
        let mut registry = ProfileRegistry::with_builtins();
        registry
            .register(
                profile_engine::RedactionProfile::from_yaml_str(
                    "name: latin-only\nbase: default\nlanguages: [en]\n",
                )
                .unwrap(),
            )
            .unwrap();
        let profile = registry.resolve("latin-only").unwrap();

        let mut tagged = name(0, 0, 50, 10, 0.9);
        tagged.language = Some("zh".into());
        let untagged = name(0, 100, 50, 10, 0.9);

        let fused = fuse_page(vec![tagged, untagged], &profile);
        // The zh span is filtered, the untagged one is kept.
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].bbox.y, 100);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use profile_engine::ProfileRegistry;
    use proptest::prelude::*;

    fn confidence_strategy() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(0.01f64..=1.0, 1..6)
    }

    proptest! {
        /// Combined confidence never drops below the strongest member and
        /// never exceeds the cap above it.
        #[test]
        fn combined_confidence_bounded(confidences in confidence_strategy()) {
            let combined = combined_confidence(&confidences);
            let strongest = confidences.iter().fold(0.0f64, |max, &c| max.max(c));

            prop_assert!(combined >= strongest - 1e-12);
            prop_assert!(combined <= (strongest + CONFIDENCE_MARGIN).min(1.0) + 1e-12);
        }

        /// No same-kind pair in the fused output overlaps at or above the
        /// dedup threshold, whatever the input geometry.
        #[test]
        fn fused_output_has_no_same_kind_overlap(
            boxes in prop::collection::vec((0u32..400, 0u32..400, 10u32..120, 10u32..120), 1..12),
        ) {
            let profile = ProfileRegistry::with_builtins().resolve("default").unwrap();
            let detections: Vec<Detection> = boxes
                .into_iter()
                .map(|(x, y, w, h)| {
                    Detection::visual(
                        PiiKind::Face,
                        0,
                        BoundingBox::new(x, y, w, h),
                        0.9,
                        "face-model",
                    )
                })
                .collect();

            let fused = fuse_page(detections, &profile);
            for i in 0..fused.len() {
                for j in (i + 1)..fused.len() {
                    prop_assert!(fused[i].bbox.iou(&fused[j].bbox) < IOU_THRESHOLD);
                }
            }
        }
    }
}
