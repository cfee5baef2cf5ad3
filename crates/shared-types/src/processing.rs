//! Processing results, the user-visible error taxonomy, and the per-document
//! state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pii::{Detection, PiiKind};

/// Kind tags for user-visible processing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingErrorKind {
    // Input
    UnsupportedFormat,
    CorruptInput,
    PageDecodeFailed,
    // Profile
    InvalidProfile,
    // Detection
    DetectorUnavailable,
    DetectorTimeout,
    InvalidDetection,
    // Redaction
    RedactionFailed,
    // Crypto
    KeyNotFound,
    SigningFailed,
    VerificationFailed,
    // Resource
    MemoryPressure,
    DiskFull,
    Cancelled,
    DeadlineExceeded,
}

/// One entry of `ProcessingResult.errors`.
///
/// Messages are actionable and must never contain detected text or other
/// document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingError {
    pub kind: ProcessingErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_index: Option<u32>,
    pub message: String,
}

impl ProcessingError {
    pub fn new(kind: ProcessingErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            page_index: None,
            message: message.into(),
        }
    }

    pub fn on_page(kind: ProcessingErrorKind, page_index: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            page_index: Some(page_index),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.page_index {
            Some(page) => write!(f, "{:?} (page {}): {}", self.kind, page, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

/// Outcome of processing one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Identifier of this processing run (matches the audit record).
    pub document_id: Uuid,
    /// SHA-256 of the raw input bytes, lowercase hex.
    pub input_fingerprint: String,
    /// SHA-256 of the final output bytes; `None` when no output was emitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_fingerprint: Option<String>,
    pub profile_name: String,
    pub profile_version: String,
    /// Post-fusion detections actually applied, in deterministic order.
    pub detections: Vec<Detection>,
    pub pages_processed: u32,
    pub redactions_applied: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ProcessingError>,
}

impl ProcessingResult {
    pub fn detection_count(&self) -> usize {
        self.detections.len()
    }

    /// Distinct kinds found, in deterministic tag order.
    pub fn detection_kinds(&self) -> Vec<PiiKind> {
        let mut kinds: Vec<PiiKind> = self.detections.iter().map(|d| d.kind).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    pub fn detections_of_kind(&self, kind: PiiKind) -> impl Iterator<Item = &Detection> {
        self.detections.iter().filter(move |d| d.kind == kind)
    }

    pub fn high_confidence_detections(&self, threshold: f64) -> impl Iterator<Item = &Detection> {
        self.detections
            .iter()
            .filter(move |d| d.confidence >= threshold)
    }
}

/// Per-document lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Pending,
    Loading,
    Detecting,
    Redacting,
    Finalizing,
    Audited,
    Done,
    Failed,
}

impl DocumentState {
    /// Legal forward edges of the lifecycle. Any state may fail.
    pub fn can_transition_to(&self, next: DocumentState) -> bool {
        use DocumentState::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (*self, next),
            (Pending, Loading)
                | (Loading, Detecting)
                | (Detecting, Redacting)
                // Detecting -> Finalizing covers documents whose pages all
                // end up with zero kept detections.
                | (Detecting, Finalizing)
                | (Redacting, Detecting)
                | (Redacting, Finalizing)
                | (Finalizing, Audited)
                | (Audited, Done)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentState::Done | DocumentState::Failed)
    }
}
