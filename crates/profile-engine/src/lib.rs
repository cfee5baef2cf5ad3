//! Redaction profiles: the policy layer mapping PII kinds to enable flags,
//! confidence thresholds, and rendering styles.
//!
//! Profiles are loaded from YAML or JSON, may inherit from a named base, and
//! resolve deterministically into an immutable [`EffectiveProfile`] that the
//! rest of the pipeline (and the audit record) consumes.

pub mod builtin;
pub mod model;
pub mod registry;
pub mod style;

pub use model::{RedactionProfile, RuleSpec};
pub use registry::{EffectiveProfile, ProfileRegistry};
pub use style::{PatternId, StyleSpec};

/// Errors raised while loading, validating, or resolving profiles.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile parse error: {0}")]
    Parse(String),

    #[error("profile '{profile}': unknown pii kind '{tag}'")]
    UnknownKind { profile: String, tag: String },

    #[error("profile '{profile}': {field} = {value} is outside [0, 1]")]
    ConfidenceOutOfRange {
        profile: String,
        field: String,
        value: f64,
    },

    #[error("profile '{profile}': invalid style: {detail}")]
    InvalidStyle { profile: String, detail: String },

    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    #[error("profile '{profile}': base profile '{base}' is not registered")]
    UnknownBase { profile: String, base: String },

    #[error("profile inheritance cycle: {chain}")]
    InheritanceCycle { chain: String },

    #[error("profile io: {0}")]
    Io(#[from] std::io::Error),
}
