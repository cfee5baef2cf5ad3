//! Pre-mux page fingerprints.

use shared_crypto::StreamingHasher;
use shared_types::PageRaster;

/// SHA-256 over a raster's dimensions and row-major RGB8 pixels, lowercase
/// hex. Computed before the writer muxes the page into the output
/// container; this is the value the audit record binds per page.
pub fn page_fingerprint(raster: &PageRaster) -> String {
    let mut hasher = StreamingHasher::new();
    hasher.update(&raster.width().to_le_bytes());
    hasher.update(&raster.height().to_le_bytes());
    hasher.update(raster.as_bytes());
    hasher.finalize_hex()
}
