//! Per-document orchestration: load, detect, fuse, redact, write, audit.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use audit_engine::{
    summarize_detections, AuditEngine, AuditRecord, SignedAuditRecord, Timestamps,
};
use detection_engine::{fuse_page, sanitize_detections, TextDetector, VisualDetector};
use document_io::{open, writer_for, DocumentError};
use profile_engine::EffectiveProfile;
use redaction_engine::{redact_page, RedactedPage};
use shared_crypto::{sha256_hex, KeyStore, StreamingHasher};
use shared_types::{
    Detection, DetectionSource, DocumentState, PageView, ProcessingError, ProcessingErrorKind,
    ProcessingResult,
};

use crate::cancel::CancelFlag;
use crate::config::ProcessorConfig;

/// Hashing block size for input/output streams.
const HASH_CHUNK: usize = 64 * 1024;

/// Fallback page geometry (US Letter) for pages whose dimensions are
/// unknowable because they failed to decode.
const FALLBACK_PAGE_INCHES: (f32, f32) = (8.5, 11.0);

/// Everything one processing run produces.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub result: ProcessingResult,
    /// The redacted output container; `None` when no output was emitted.
    pub output: Option<Vec<u8>>,
    /// The signed audit envelope; produced whenever output bytes were.
    pub audit: Option<SignedAuditRecord>,
}

enum PageFailure {
    Detector(String),
    DeadlineExceeded,
}

/// Orchestrates single documents through the pipeline.
///
/// The processor exclusively owns the page views in flight; detectors see
/// read-only pages, the redaction engine writes to fresh buffers, and the
/// audit engine owns the persisted record sink.
pub struct Processor {
    config: ProcessorConfig,
    visual: Arc<dyn VisualDetector>,
    text: Arc<dyn TextDetector>,
    audit: AuditEngine,
    keystore: Arc<KeyStore>,
    signer_key_id: String,
}

impl Processor {
    pub fn new(
        config: ProcessorConfig,
        visual: Arc<dyn VisualDetector>,
        text: Arc<dyn TextDetector>,
        audit: AuditEngine,
        keystore: Arc<KeyStore>,
        signer_key_id: impl Into<String>,
    ) -> Self {
        Self {
            config,
            visual,
            text,
            audit,
            keystore,
            signer_key_id: signer_key_id.into(),
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Process one document under the given resolved profile.
    pub async fn process(&self, input: &[u8], profile: &EffectiveProfile) -> ProcessOutcome {
        self.process_document(input, profile, &CancelFlag::new(), None)
            .await
    }

    pub async fn process_with_cancel(
        &self,
        input: &[u8],
        profile: &EffectiveProfile,
        cancel: &CancelFlag,
    ) -> ProcessOutcome {
        self.process_document(input, profile, cancel, None).await
    }

    /// Full entry point; `previous_audit_id` links a reprocessing run to
    /// its predecessor's audit record.
    #[instrument(skip_all, fields(input_len = input.len(), profile = %profile.name))]
    pub async fn process_document(
        &self,
        input: &[u8],
        profile: &EffectiveProfile,
        cancel: &CancelFlag,
        previous_audit_id: Option<Uuid>,
    ) -> ProcessOutcome {
        let started_at = Utc::now();
        let document_id = Uuid::new_v4();
        let mut state = DocumentState::Pending;
        let mut errors: Vec<ProcessingError> = Vec::new();

        let mut hasher = StreamingHasher::new();
        for chunk in input.chunks(HASH_CHUNK) {
            hasher.update(chunk);
        }
        let input_fingerprint = hasher.finalize_hex();

        transition(&mut state, DocumentState::Loading);
        let reader = match open(input, &self.config.loader_config()) {
            Ok(reader) => reader,
            Err(error) => {
                errors.push(ProcessingError::new(map_input_error(&error), error.to_string()));
                return self.finish_without_output(
                    document_id,
                    input_fingerprint,
                    profile,
                    started_at,
                    errors,
                );
            }
        };
        let page_count = reader.page_count();
        let mut writer = writer_for(reader.source_kind());

        let mut all_detections: Vec<Detection> = Vec::new();
        let mut page_fingerprints: Vec<String> = Vec::new();
        let mut degraded_redactions = Vec::new();
        let mut degraded_pages: Vec<u32> = Vec::new();
        let mut text_scrubs = Vec::new();
        let mut redactions_applied: u32 = 0;
        let mut pages_written: u32 = 0;
        let mut aborted = false;

        transition(&mut state, DocumentState::Detecting);
        'pages: for page_index in 0..page_count {
            if cancel.is_cancelled() {
                errors.push(ProcessingError::new(
                    ProcessingErrorKind::Cancelled,
                    "processing cancelled by caller",
                ));
                aborted = true;
                break 'pages;
            }

            let page = match reader.page(page_index) {
                Ok(page) => page,
                Err(error @ DocumentError::PageDecodeFailed { .. }) => {
                    if self.config.strict_mode {
                        errors.push(ProcessingError::on_page(
                            ProcessingErrorKind::PageDecodeFailed,
                            page_index,
                            error.to_string(),
                        ));
                        aborted = true;
                        break 'pages;
                    }
                    warn!(page = page_index, %error, "page decode failed, emitting full-page fallback");
                    let dpi = self.config.target_dpi;
                    let width = (FALLBACK_PAGE_INCHES.0 * dpi as f32) as u32;
                    let height = (FALLBACK_PAGE_INCHES.1 * dpi as f32) as u32;
                    let fallback = RedactedPage::full_page_fallback(page_index, width, height);
                    if let Err(write_error) =
                        writer.write_page(&fallback.raster, dpi, None)
                    {
                        errors.push(ProcessingError::on_page(
                            ProcessingErrorKind::DiskFull,
                            page_index,
                            write_error.to_string(),
                        ));
                        aborted = true;
                        break 'pages;
                    }
                    page_fingerprints.push(fallback.fingerprint);
                    redactions_applied += fallback.redactions_applied;
                    degraded_pages.push(page_index);
                    pages_written += 1;
                    continue;
                }
                Err(error) => {
                    errors.push(ProcessingError::on_page(
                        map_input_error(&error),
                        page_index,
                        error.to_string(),
                    ));
                    aborted = true;
                    break 'pages;
                }
            };

            let page_dpi = page.dpi;
            let (page_width, page_height) = (page.width_px, page.height_px);

            let outcome = match self.config.per_page_deadline {
                Some(deadline) => {
                    match tokio::time::timeout(deadline, self.run_page(page, profile)).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(PageFailure::DeadlineExceeded),
                    }
                }
                None => self.run_page(page, profile).await,
            };

            match outcome {
                Ok((redacted, fused)) => {
                    transition(&mut state, DocumentState::Redacting);
                    if let Err(write_error) = writer.write_page(
                        &redacted.raster,
                        page_dpi,
                        redacted.scrubbed_spans.as_deref(),
                    ) {
                        errors.push(ProcessingError::on_page(
                            ProcessingErrorKind::DiskFull,
                            page_index,
                            write_error.to_string(),
                        ));
                        aborted = true;
                        break 'pages;
                    }
                    page_fingerprints.push(redacted.fingerprint);
                    redactions_applied += redacted.redactions_applied;
                    degraded_redactions.extend(redacted.degraded);
                    text_scrubs.extend(redacted.text_scrubs);
                    all_detections.extend(fused);
                    pages_written += 1;
                    transition(&mut state, DocumentState::Detecting);
                }
                Err(failure) => {
                    let (kind, message) = match &failure {
                        PageFailure::Detector(detail) => {
                            (ProcessingErrorKind::DetectorUnavailable, detail.clone())
                        }
                        PageFailure::DeadlineExceeded => (
                            ProcessingErrorKind::DeadlineExceeded,
                            "per-page deadline exceeded".to_string(),
                        ),
                    };
                    if self.config.strict_mode {
                        errors.push(ProcessingError::on_page(kind, page_index, message));
                        aborted = true;
                        break 'pages;
                    }
                    // Fail safe: a page that could not be examined is
                    // emitted fully covered.
                    warn!(page = page_index, reason = %message, "degrading page to full-page fallback");
                    let fallback =
                        RedactedPage::full_page_fallback(page_index, page_width, page_height);
                    if let Err(write_error) =
                        writer.write_page(&fallback.raster, page_dpi, None)
                    {
                        errors.push(ProcessingError::on_page(
                            ProcessingErrorKind::DiskFull,
                            page_index,
                            write_error.to_string(),
                        ));
                        aborted = true;
                        break 'pages;
                    }
                    page_fingerprints.push(fallback.fingerprint);
                    redactions_applied += fallback.redactions_applied;
                    degraded_pages.push(page_index);
                    pages_written += 1;
                }
            }
        }

        if pages_written == 0 {
            return self.finish_without_output(
                document_id,
                input_fingerprint,
                profile,
                started_at,
                errors,
            );
        }

        transition(&mut state, DocumentState::Finalizing);
        let output = match writer.finish() {
            Ok(bytes) => bytes,
            Err(error) => {
                errors.push(ProcessingError::new(
                    ProcessingErrorKind::DiskFull,
                    error.to_string(),
                ));
                return self.finish_without_output(
                    document_id,
                    input_fingerprint,
                    profile,
                    started_at,
                    errors,
                );
            }
        };
        let output_fingerprint = sha256_hex(&output);
        let success = !aborted;

        transition(&mut state, DocumentState::Audited);
        let sequence = self.audit.next_sequence();
        let finished_at = Utc::now();

        let mut model_tags = vec![
            self.visual.model_tag().to_string(),
            self.text.model_tag().to_string(),
        ];
        model_tags.sort();
        model_tags.dedup();

        let record = AuditRecord {
            document_id,
            previous_audit_id,
            sequence,
            input_fingerprint: input_fingerprint.clone(),
            output_fingerprint: output_fingerprint.clone(),
            per_page_output_fingerprints: page_fingerprints,
            profile: profile.clone(),
            detections_summary: summarize_detections(&all_detections),
            detections: all_detections.clone(),
            degraded_redactions,
            degraded_pages,
            text_scrubs,
            timestamps: Timestamps {
                started_at,
                finished_at,
                monotonic_counter: sequence,
            },
            tool_version: self.config.tool_version.clone(),
            model_tags,
            success,
        };

        // Crypto failures always surface; an unsigned run never reports
        // success.
        let audit = match self.keystore.acquire(&self.signer_key_id) {
            Ok(handle) => match self.audit.sign_and_persist(record, &*handle) {
                Ok(envelope) => Some(envelope),
                Err(error) => {
                    errors.push(ProcessingError::new(
                        ProcessingErrorKind::SigningFailed,
                        error.to_string(),
                    ));
                    None
                }
            },
            Err(error) => {
                errors.push(ProcessingError::new(
                    ProcessingErrorKind::KeyNotFound,
                    error.to_string(),
                ));
                None
            }
        };
        let success = success && audit.is_some();
        transition(
            &mut state,
            if success {
                DocumentState::Done
            } else {
                DocumentState::Failed
            },
        );

        ProcessOutcome {
            result: ProcessingResult {
                document_id,
                input_fingerprint,
                output_fingerprint: Some(output_fingerprint),
                profile_name: profile.name.clone(),
                profile_version: profile.version.clone(),
                detections: all_detections,
                pages_processed: pages_written,
                redactions_applied,
                started_at,
                finished_at,
                success,
                errors,
            },
            output: Some(output),
            audit,
        }
    }

    /// Detect (both modalities concurrently), fuse, and redact one page.
    ///
    /// Detectors run on the blocking pool and share only the read-only
    /// page view; fusion and redaction contain no suspension points.
    async fn run_page(
        &self,
        page: PageView,
        profile: &EffectiveProfile,
    ) -> Result<(RedactedPage, Vec<Detection>), PageFailure> {
        let page = Arc::new(page);

        let visual_task = {
            let detector = Arc::clone(&self.visual);
            let page = Arc::clone(&page);
            tokio::task::spawn_blocking(move || detector.detect(&page))
        };
        let text_task = {
            let detector = Arc::clone(&self.text);
            let page = Arc::clone(&page);
            tokio::task::spawn_blocking(move || detector.detect(&page))
        };
        let (visual, text) = tokio::join!(visual_task, text_task);

        let visual = visual
            .map_err(|e| PageFailure::Detector(e.to_string()))?
            .map_err(|e| PageFailure::Detector(e.to_string()))?;
        let text = text
            .map_err(|e| PageFailure::Detector(e.to_string()))?
            .map_err(|e| PageFailure::Detector(e.to_string()))?;

        let mut detections = sanitize_detections(visual, &page, DetectionSource::Visual);
        detections.extend(sanitize_detections(text, &page, DetectionSource::Textual));

        let fused = fuse_page(detections, profile);
        let redacted = redact_page(&page, &fused, profile);
        Ok((redacted, fused))
    }

    fn finish_without_output(
        &self,
        document_id: Uuid,
        input_fingerprint: String,
        profile: &EffectiveProfile,
        started_at: chrono::DateTime<Utc>,
        errors: Vec<ProcessingError>,
    ) -> ProcessOutcome {
        ProcessOutcome {
            result: ProcessingResult {
                document_id,
                input_fingerprint,
                output_fingerprint: None,
                profile_name: profile.name.clone(),
                profile_version: profile.version.clone(),
                detections: Vec::new(),
                pages_processed: 0,
                redactions_applied: 0,
                started_at,
                finished_at: Utc::now(),
                success: false,
                errors,
            },
            output: None,
            audit: None,
        }
    }
}

fn transition(state: &mut DocumentState, next: DocumentState) {
    debug_assert!(
        state.can_transition_to(next) || *state == next,
        "illegal document state transition {:?} -> {:?}",
        state,
        next
    );
    if *state != next {
        debug!(from = ?state, to = ?next, "document state");
        *state = next;
    }
}

fn map_input_error(error: &DocumentError) -> ProcessingErrorKind {
    match error {
        DocumentError::UnsupportedFormat => ProcessingErrorKind::UnsupportedFormat,
        DocumentError::CorruptInput(_) | DocumentError::PageOutOfRange { .. } => {
            ProcessingErrorKind::CorruptInput
        }
        DocumentError::PageDecodeFailed { .. } => ProcessingErrorKind::PageDecodeFailed,
        DocumentError::WriteFailed(_) => ProcessingErrorKind::DiskFull,
    }
}
