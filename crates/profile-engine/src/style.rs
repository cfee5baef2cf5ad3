//! Redaction rendering styles.

use serde::{Deserialize, Serialize};

/// Deterministic overlay patterns. Patterns carry no color; they render
/// black-on-white at full opacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternId {
    DiagonalHatch,
}

/// How a redacted region is rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StyleSpec {
    /// Opaque fill with the given RGB color.
    Solid { color: [u8; 3] },
    /// Nearest-neighbor mosaic with `block_px` square blocks.
    Pixelate { block_px: u32 },
    /// Separable box blur, `iterations` passes of radius `radius_px`.
    Blur { radius_px: u32, iterations: u32 },
    /// Deterministic overlay pattern at full opacity.
    Pattern { id: PatternId },
}

impl StyleSpec {
    pub fn solid_black() -> Self {
        StyleSpec::Solid { color: [0, 0, 0] }
    }

    /// Parameter sanity for the non-trivial styles.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StyleSpec::Solid { .. } | StyleSpec::Pattern { .. } => Ok(()),
            StyleSpec::Pixelate { block_px } => {
                if *block_px == 0 {
                    Err("pixelate block_px must be at least 1".into())
                } else {
                    Ok(())
                }
            }
            StyleSpec::Blur {
                radius_px,
                iterations,
            } => {
                if *radius_px == 0 {
                    Err("blur radius_px must be at least 1".into())
                } else if *iterations == 0 {
                    Err("blur iterations must be at least 1".into())
                } else {
                    Ok(())
                }
            }
        }
    }
}
