//! Document loading and writing: the per-page raster + text-layer contract.
//!
//! Inputs are paginated PDFs (optionally carrying an embedded text layer)
//! or single-page raster images. Outputs mirror the input pagination with
//! redacted rasters and, for PDF, an invisible scrubbed text layer.

pub mod image_reader;
pub mod pdf_content;
pub mod pdf_reader;
pub mod reader;
pub mod sniff;
pub mod writer;

pub use image_reader::ImageReader;
pub use pdf_reader::PdfReader;
pub use reader::{open, DocumentReader, LoaderConfig};
pub use sniff::{sniff, SourceKind};
pub use writer::{writer_for, ImageWriter, OutputWriter, PdfPageWriter};

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors from document loading and output assembly.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("unsupported input format")]
    UnsupportedFormat,

    #[error("corrupt input: {0}")]
    CorruptInput(String),

    #[error("page {page_index} failed to decode: {detail}")]
    PageDecodeFailed { page_index: u32, detail: String },

    #[error("page {page_index} out of range (document has {page_count} pages)")]
    PageOutOfRange { page_index: u32, page_count: u32 },

    #[error("output write failed: {0}")]
    WriteFailed(String),
}
