//! PDF annotation engine: overlay elements, coordinate mapping, and export.
//!
//! This crate holds everything that does not need a browser: element and
//! session state, the pixel/point coordinate transform, pointer gesture math,
//! form field tracking, and the export paths (PDF re-authoring via lopdf,
//! project JSON, text CSV). The wasm app wires these into the DOM.
//!
//! Positions are stored in PDF points with a top-left origin and converted to
//! screen pixels only at render time, so annotations survive zoom changes and
//! window resizes without drift.

pub mod coords;
pub mod document;
pub mod elements;
pub mod error;
pub mod export;
pub mod forms;
pub mod interaction;
pub mod session;

pub use coords::PageTransform;
pub use document::PdfDocument;
pub use elements::{
    SavedSignature, SignatureElement, SignatureLibrary, TextElement, MAX_SAVED_SIGNATURES,
};
pub use error::DocMarkError;
pub use export::data::{export_project_json, export_text_csv};
pub use export::pdf::export_pdf;
pub use export::ExportOutcome;
pub use forms::{FormField, FormFieldType, FormTracker};
pub use interaction::{DragGesture, ResizeGesture, ResizeHandle, RotateGesture};
pub use session::{PdfSession, Selection, ToolMode};
