use thiserror::Error;

use crate::llm::LlmError;

/// Errors surfaced by the import pipeline.
///
/// The variants map onto the recovery behavior the pipeline promises:
/// `Fetch` failures fall back to a stale cache entry when one exists,
/// `UnsupportedSource` and `EmptyExtraction` are client-correctable,
/// and `ToolMissing` is fatal for the request without retry.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("Extraction produced no ingredients and no steps")]
    EmptyExtraction,

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Required tool not available: {0}")]
    ToolMissing(String),

    #[error("{tool} failed: {message}")]
    Tool { tool: &'static str, message: String },

    #[error("Language model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Cache store error: {0}")]
    Store(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    /// Transient failures that may be papered over with a cached entry.
    /// Hard rejections (unsupported source, bad input) are not.
    pub fn is_recoverable_with_cache(&self) -> bool {
        !matches!(
            self,
            ImportError::UnsupportedSource(_) | ImportError::InvalidInput(_)
        )
    }
}
