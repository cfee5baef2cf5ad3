//! Coordinate-driven redaction: per-style raster rendering, text-layer
//! scrubbing, and pre-mux page fingerprinting.

pub mod engine;
pub mod fingerprint;
pub mod scrub;
pub mod styles;

pub use engine::{redact_page, DegradedRedaction, RedactedPage};
pub use fingerprint::page_fingerprint;
pub use scrub::{scrub_spans, TextScrub};

/// Errors from rendering a single redaction box.
#[derive(Debug, thiserror::Error)]
pub enum RedactionError {
    #[error("redaction bbox lies outside the raster")]
    OutOfBounds,

    #[error("invalid style parameter: {0}")]
    InvalidStyle(String),

    #[error("rendering failed: {0}")]
    RenderFailed(String),
}
