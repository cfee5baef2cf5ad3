//! The audit record and its signed envelope.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use profile_engine::EffectiveProfile;
use redaction_engine::{DegradedRedaction, TextScrub};
use serde::{Deserialize, Serialize};
use shared_crypto::{sha256_hex, to_canonical_json, SignatureAlgorithm};
use shared_types::Detection;
use uuid::Uuid;

/// Wall-clock bounds of a processing run plus a monotonic counter.
///
/// Kept in a sub-object of its own: everything else in a record is a pure
/// function of input bytes, profile, and detector output, so determinism
/// checks hash the record with this object excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamps {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub monotonic_counter: u64,
}

/// Everything the signature covers.
///
/// A record is created once, persisted exactly once, and never modified;
/// reprocessing a document produces a new record pointing at its
/// predecessor through `previous_audit_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub document_id: Uuid,
    /// Chain-of-custody link to the audit of the prior processing run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_audit_id: Option<Uuid>,
    /// Monotonic sequence number within the engine that produced this
    /// record.
    pub sequence: u64,
    /// SHA-256 of the raw input bytes, lowercase hex.
    pub input_fingerprint: String,
    /// SHA-256 of the final output bytes, lowercase hex.
    pub output_fingerprint: String,
    /// Per-page pre-mux raster fingerprints, indexed by page order.
    pub per_page_output_fingerprints: Vec<String>,
    /// The resolved profile, inlined with its precedence notes.
    pub profile: EffectiveProfile,
    /// Detections actually applied (post-fusion, pre-redaction), in
    /// deterministic order.
    pub detections: Vec<Detection>,
    /// Kind tag to count, for summary reporting.
    pub detections_summary: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_redactions: Vec<DegradedRedaction>,
    /// Pages that were emitted as full-page fallbacks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_pages: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_scrubs: Vec<TextScrub>,
    pub timestamps: Timestamps,
    pub tool_version: String,
    /// Every detector model that contributed, sorted.
    pub model_tags: Vec<String>,
    pub success: bool,
}

impl AuditRecord {
    /// Canonical (RFC 8785) byte form; this is what gets signed.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, crate::AuditError> {
        to_canonical_json(self).map_err(crate::AuditError::Crypto)
    }

    /// Hash of the canonical record, used for chain verification.
    pub fn record_hash(&self) -> Result<String, crate::AuditError> {
        Ok(sha256_hex(&self.canonical_bytes()?))
    }

    /// Hash of the record with the `timestamps` sub-object removed: equal
    /// for two runs over identical bytes, profile, detector output, and
    /// document id.
    pub fn content_hash(&self) -> Result<String, crate::AuditError> {
        let mut value = serde_json::to_value(self)
            .map_err(|e| crate::AuditError::Serialization(e.to_string()))?;
        if let Some(map) = value.as_object_mut() {
            map.remove("timestamps");
        }
        Ok(sha256_hex(&shared_crypto::canonical_json(&value)))
    }
}

/// On-disk envelope: the record plus its detached signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedAuditRecord {
    pub record: AuditRecord,
    /// Base64 signature over the record's canonical JSON.
    pub signature: String,
    pub signer_key_id: String,
    pub signature_algorithm: SignatureAlgorithm,
}

impl SignedAuditRecord {
    pub fn to_json(&self) -> Result<String, crate::AuditError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::AuditError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &[u8]) -> Result<Self, crate::AuditError> {
        serde_json::from_slice(json).map_err(|e| crate::AuditError::Serialization(e.to_string()))
    }
}

/// Count detections per kind tag.
pub fn summarize_detections(detections: &[Detection]) -> BTreeMap<String, u32> {
    let mut summary = BTreeMap::new();
    for detection in detections {
        *summary.entry(detection.kind.tag().to_string()).or_insert(0) += 1;
    }
    summary
}
