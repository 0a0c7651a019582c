//! Error types for curation and the batch pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a [`Tokenizer`](crate::Tokenizer) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tokenizer error: {message}")]
pub struct EncodingError {
    pub message: String,
}

impl EncodingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error curating a single record.
///
/// A record that is too thin to use is not an error; see
/// [`Verdict::Rejected`](crate::Verdict::Rejected).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurationError {
    /// A required text field is missing or not a string.
    #[error("invalid record: field `{field}` is missing or not text")]
    InvalidRecord { field: &'static str },

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Error type for the batch pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Error reading or writing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The input directory holds no JSONL files.
    #[error("no JSONL files found under '{0}'")]
    NoInputFiles(PathBuf),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_record_display() {
        let err = CurationError::InvalidRecord { field: "title" };
        assert!(err.to_string().contains("`title`"));
    }

    #[test]
    fn test_encoding_error_converts() {
        let err: CurationError = EncodingError::new("unknown byte").into();
        assert_eq!(err.to_string(), "tokenizer error: unknown byte");
    }
}
