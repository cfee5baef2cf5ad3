//! Forensic audit records: signed, immutable, independently verifiable
//! proof of what was done to which bytes under which policy.

pub mod engine;
pub mod record;
pub mod sink;
pub mod validate;

pub use engine::AuditEngine;
pub use record::{summarize_detections, AuditRecord, SignedAuditRecord, Timestamps};
pub use sink::{AuditSink, FileAuditSink, MemoryAuditSink};
pub use validate::{
    validate, validate_page_fingerprints, verify_chain, ValidationFailure, ValidationFailureKind,
    ValidationReport,
};

/// Errors from building, signing, or persisting audit records.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("record serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Crypto(#[from] shared_crypto::CryptoError),

    #[error("audit sink failed: {0}")]
    Sink(String),
}
