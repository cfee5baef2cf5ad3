//! Hybrid PII detection: detector contracts, the built-in pattern-based
//! text detector, detector-output sanitization, and visual/textual fusion.

pub mod fusion;
pub mod patterns;
pub mod sanitize;
pub mod text_detector;
pub mod traits;

pub use fusion::fuse_page;
pub use sanitize::sanitize_detections;
pub use text_detector::PatternTextDetector;
pub use traits::{TextDetector, VisualDetector};

/// Errors surfaced by detector implementations.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("detector unavailable: {0}")]
    Unavailable(String),

    #[error("detector timed out")]
    Timeout,

    #[error("detector failed: {0}")]
    Internal(String),
}
