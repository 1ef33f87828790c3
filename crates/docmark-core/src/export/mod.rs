//! Export pipeline: PDF re-authoring and structured data output.
//!
//! All paths are read-only with respect to session state. The raster (PNG)
//! path lives in the browser layer because it reads the rendered canvas.

pub mod data;
pub mod pdf;

/// Result of a PDF export. Per-element embed failures do not abort the
/// export; the offending element ids are reported here instead.
#[derive(Debug)]
pub struct ExportOutcome {
    pub bytes: Vec<u8>,
    pub skipped: Vec<String>,
}
