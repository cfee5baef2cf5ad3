//! Building, signing, and persisting audit records.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine as _;
use shared_crypto::SigningIdentity;
use tracing::info;

use crate::record::{AuditRecord, SignedAuditRecord};
use crate::sink::AuditSink;
use crate::AuditError;

/// The only component permitted to emit persisted metadata.
///
/// Owns the sink exclusively and hands out monotonic sequence numbers;
/// records pass through exactly once and are never mutated.
pub struct AuditEngine {
    sequence: AtomicU64,
    sink: Box<dyn AuditSink>,
}

impl AuditEngine {
    pub fn new(sink: Box<dyn AuditSink>) -> Self {
        Self {
            sequence: AtomicU64::new(0),
            sink,
        }
    }

    /// Next sequence number, monotonic across this engine's lifetime.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Sign the record over its canonical bytes and persist the envelope.
    ///
    /// The key handle is used for the duration of this call only.
    pub fn sign_and_persist(
        &self,
        record: AuditRecord,
        identity: &dyn SigningIdentity,
    ) -> Result<SignedAuditRecord, AuditError> {
        let canonical = record.canonical_bytes()?;
        let signature = identity.sign(&canonical)?;
        let envelope = SignedAuditRecord {
            signer_key_id: identity.key_id()?,
            signature_algorithm: identity.algorithm(),
            signature: base64::engine::general_purpose::STANDARD.encode(signature),
            record,
        };

        self.sink
            .persist(&envelope)
            .map_err(|e| AuditError::Sink(e.to_string()))?;
        info!(
            document_id = %envelope.record.document_id,
            sequence = envelope.record.sequence,
            key_id = %envelope.signer_key_id,
            "audit record persisted"
        );
        Ok(envelope)
    }
}
