//! Audit record persistence.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::record::SignedAuditRecord;
use crate::AuditError;

/// Where signed envelopes go. Records are self-contained; aggregation
/// policy (per-file, per-tenant log, remote store) belongs to the sink.
pub trait AuditSink: Send + Sync {
    /// Persist one envelope. Must refuse to overwrite an existing record.
    fn persist(&self, envelope: &SignedAuditRecord) -> Result<(), AuditError>;
}

/// One JSON file per record: `<document_id>.audit.json`.
pub struct FileAuditSink {
    dir: PathBuf,
}

impl FileAuditSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, envelope: &SignedAuditRecord) -> PathBuf {
        self.dir
            .join(format!("{}.audit.json", envelope.record.document_id))
    }
}

impl AuditSink for FileAuditSink {
    fn persist(&self, envelope: &SignedAuditRecord) -> Result<(), AuditError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| AuditError::Sink(e.to_string()))?;
        let path = self.path_for(envelope);
        if path.exists() {
            return Err(AuditError::Sink(format!(
                "audit record already persisted at {}",
                path.display()
            )));
        }
        std::fs::write(&path, envelope.to_json()?).map_err(|e| AuditError::Sink(e.to_string()))
    }
}

/// In-memory sink for tests and embedding.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Arc<Mutex<Vec<SignedAuditRecord>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink backed by the same storage as `other`, so a caller can keep
    /// one handle for inspection while the engine owns the other.
    pub fn shared(other: &Arc<MemoryAuditSink>) -> Self {
        Self {
            records: Arc::clone(&other.records),
        }
    }

    pub fn records(&self) -> Vec<SignedAuditRecord> {
        self.records.lock().expect("sink lock poisoned").clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn persist(&self, envelope: &SignedAuditRecord) -> Result<(), AuditError> {
        let mut records = self.records.lock().expect("sink lock poisoned");
        if records
            .iter()
            .any(|r| r.record.document_id == envelope.record.document_id)
        {
            return Err(AuditError::Sink(format!(
                "audit record for document {} already persisted",
                envelope.record.document_id
            )));
        }
        records.push(envelope.clone());
        Ok(())
    }
}
