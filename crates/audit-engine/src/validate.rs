//! Independent validation of outputs against signed audit records.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use shared_crypto::{sha256_hex, VerifyingIdentity};

use crate::record::SignedAuditRecord;

/// What went wrong, without echoing document content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationFailureKind {
    MalformedRecord,
    SignerKeyMismatch,
    SignatureInvalid,
    OutputFingerprintMismatch,
    PageFingerprintMismatch,
    ChainBroken,
}

/// Structured diagnostic for the first check that failed.
///
/// Details carry hashes, key ids, and indices only; detection text never
/// appears here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub kind: ValidationFailureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_index: Option<u32>,
    pub detail: String,
}

/// Outcome of a validation run. `failure` holds the first mismatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ValidationFailure>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            failure: None,
        }
    }

    fn fail(kind: ValidationFailureKind, detail: impl Into<String>) -> Self {
        Self {
            valid: false,
            failure: Some(ValidationFailure {
                kind,
                page_index: None,
                detail: detail.into(),
            }),
        }
    }

    fn fail_on_page(kind: ValidationFailureKind, page_index: u32, detail: impl Into<String>) -> Self {
        Self {
            valid: false,
            failure: Some(ValidationFailure {
                kind,
                page_index: Some(page_index),
                detail: detail.into(),
            }),
        }
    }
}

/// Validate a candidate output document against a signed audit envelope.
///
/// Checks run in order and stop at the first mismatch: envelope parse,
/// signer key id, signature over the canonical record, then the output
/// fingerprint.
pub fn validate(
    output_bytes: &[u8],
    envelope_bytes: &[u8],
    public_key: &VerifyingIdentity,
) -> ValidationReport {
    let envelope = match SignedAuditRecord::from_json(envelope_bytes) {
        Ok(envelope) => envelope,
        Err(error) => {
            return ValidationReport::fail(ValidationFailureKind::MalformedRecord, error.to_string())
        }
    };

    let key_id = match public_key.key_id() {
        Ok(id) => id,
        Err(error) => {
            return ValidationReport::fail(ValidationFailureKind::SignerKeyMismatch, error.to_string())
        }
    };
    if key_id != envelope.signer_key_id {
        return ValidationReport::fail(
            ValidationFailureKind::SignerKeyMismatch,
            format!(
                "record names signer {} but the supplied key is {}",
                envelope.signer_key_id, key_id
            ),
        );
    }
    if public_key.algorithm() != envelope.signature_algorithm {
        return ValidationReport::fail(
            ValidationFailureKind::SignerKeyMismatch,
            "signature algorithm does not match the supplied key",
        );
    }

    let canonical = match envelope.record.canonical_bytes() {
        Ok(bytes) => bytes,
        Err(error) => {
            return ValidationReport::fail(ValidationFailureKind::MalformedRecord, error.to_string())
        }
    };
    let signature = match base64::engine::general_purpose::STANDARD.decode(&envelope.signature) {
        Ok(bytes) => bytes,
        Err(_) => {
            return ValidationReport::fail(
                ValidationFailureKind::SignatureInvalid,
                "signature is not valid base64",
            )
        }
    };
    if public_key.verify(&canonical, &signature).is_err() {
        return ValidationReport::fail(
            ValidationFailureKind::SignatureInvalid,
            "signature does not verify over the canonical record",
        );
    }

    let actual = sha256_hex(output_bytes);
    if actual != envelope.record.output_fingerprint {
        return ValidationReport::fail(
            ValidationFailureKind::OutputFingerprintMismatch,
            format!(
                "output hashes to {} but the record binds {}",
                actual, envelope.record.output_fingerprint
            ),
        );
    }

    ValidationReport::ok()
}

/// Compare recomputed per-page fingerprints against the record, reporting
/// the first mismatching page. Run after [`validate`] when per-page
/// artifacts are available.
pub fn validate_page_fingerprints(
    envelope: &SignedAuditRecord,
    recomputed: &[String],
) -> ValidationReport {
    let recorded = &envelope.record.per_page_output_fingerprints;
    if recorded.len() != recomputed.len() {
        return ValidationReport::fail(
            ValidationFailureKind::PageFingerprintMismatch,
            format!(
                "record binds {} pages but {} were recomputed",
                recorded.len(),
                recomputed.len()
            ),
        );
    }
    for (index, (expected, actual)) in recorded.iter().zip(recomputed).enumerate() {
        if expected != actual {
            return ValidationReport::fail_on_page(
                ValidationFailureKind::PageFingerprintMismatch,
                index as u32,
                format!("page hashes to {} but the record binds {}", actual, expected),
            );
        }
    }
    ValidationReport::ok()
}

/// Check the chain-of-custody links of a reprocessing history, oldest
/// first: each record must name its predecessor's document id.
pub fn verify_chain(envelopes: &[SignedAuditRecord]) -> ValidationReport {
    for (index, window) in envelopes.windows(2).enumerate() {
        let (previous, current) = (&window[0].record, &window[1].record);
        if current.previous_audit_id != Some(previous.document_id) {
            return ValidationReport::fail(
                ValidationFailureKind::ChainBroken,
                format!(
                    "record {} does not reference its predecessor {}",
                    index + 1,
                    previous.document_id
                ),
            );
        }
    }
    ValidationReport::ok()
}
