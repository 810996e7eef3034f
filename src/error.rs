use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a run. Everything else is logged and skipped.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Tesseract not found. {hint}")]
    TesseractNotFound { hint: String },
    #[error("Image file '{}' not found", .0.display())]
    ImageNotFound(PathBuf),
    /// Image exists but could not be decoded
    #[error("Image {path} could not be decoded")]
    ImageDecode {
        path: String,
        source: image::ImageError,
    },
    #[error("No player data extracted")]
    NoRecords,
    #[error("Invalid name pattern '{pattern}' for {name}")]
    InvalidPattern {
        name: String,
        pattern: String,
        source: regex::Error,
    },
}
