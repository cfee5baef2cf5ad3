//! Processor and batch configuration.
//!
//! Options are an explicit record: anything the pipeline honors is a field
//! here, so an unknown option is a compile error rather than a silently
//! ignored key.

use std::time::Duration;

use document_io::LoaderConfig;

/// Per-processor configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Rasterization density for paginated sources.
    pub target_dpi: u32,
    /// Density recorded for raster sources (native resolution is kept).
    pub raster_dpi: u32,
    /// Fail the document instead of degrading pages.
    pub strict_mode: bool,
    /// Optional per-page wall-clock budget; an overrun degrades the page
    /// (or fails the document under `strict_mode`).
    pub per_page_deadline: Option<Duration>,
    /// Recorded in every audit record.
    pub tool_version: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            target_dpi: 200,
            raster_dpi: 96,
            strict_mode: false,
            per_page_deadline: None,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ProcessorConfig {
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            target_dpi: self.target_dpi,
            raster_dpi: self.raster_dpi,
        }
    }
}

/// Batch driver options.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Documents processed concurrently; the bounded queue enforces
    /// backpressure.
    pub max_in_flight: usize,
    /// Abort remaining documents after the first failure.
    pub fail_fast: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_in_flight: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            fail_fast: false,
        }
    }
}
