//! veildoc-core: the document deidentification pipeline.
//!
//! Wires the document loader, the hybrid detection engine, the redaction
//! engine, and the forensic audit engine into a per-document processor and
//! a bounded batch driver. Detectors, signing keys, and audit sinks are
//! injected at construction; this crate holds no global state.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use audit_engine::{AuditEngine, MemoryAuditSink};
//! use detection_engine::PatternTextDetector;
//! use profile_engine::ProfileRegistry;
//! use shared_crypto::{EcdsaIdentity, KeyStore};
//! use veildoc_core::{fixtures::StubVisualDetector, Processor, ProcessorConfig};
//!
//! # async fn example(input: Vec<u8>) -> anyhow::Result<()> {
//! let mut keystore = KeyStore::new();
//! let key_id = keystore.insert(Arc::new(EcdsaIdentity::generate()))?;
//!
//! let processor = Processor::new(
//!     ProcessorConfig::default(),
//!     Arc::new(StubVisualDetector::empty()),
//!     Arc::new(PatternTextDetector::new()),
//!     AuditEngine::new(Box::new(MemoryAuditSink::new())),
//!     Arc::new(keystore),
//!     key_id,
//! );
//!
//! let profile = ProfileRegistry::with_builtins().resolve("default")?;
//! let outcome = processor.process(&input, &profile).await;
//! assert!(outcome.result.success);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod cancel;
pub mod config;
pub mod fixtures;
pub mod processor;

pub use batch::{process_batch, process_batch_stream};
pub use cancel::CancelFlag;
pub use config::{BatchOptions, ProcessorConfig};
pub use processor::{ProcessOutcome, Processor};

// The validation half of the library surface: verify an output document
// against its signed audit record with nothing but the public key.
pub use audit_engine::{
    validate, validate_page_fingerprints, verify_chain, ValidationReport,
};
