use thiserror::Error;

use crate::corpus::CorpusError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
    #[error("configuration error: {0}")]
    Configuration(#[from] CorpusError),
    #[error("transient I/O error: {0}")]
    TransientIo(String),
    #[error("permission error: {0}")]
    Permission(String),
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("unhandled error: {0}")]
    Unhandled(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl AppError {
    /// Errors that end the whole session instead of a single lookup cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Permission(_) | Self::Unhandled(_)
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("screen capture failed: {0}")]
    Capture(String),
    #[error("selected region is empty")]
    EmptyRegion,
    #[error("{0}")]
    Ocr(String),
}
