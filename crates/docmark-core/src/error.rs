use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocMarkError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Page {0} not found")]
    PageNotFound(u32),

    #[error("Image decode failed: {0}")]
    ImageError(String),

    #[error("Export failed: {0}")]
    ExportError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}
