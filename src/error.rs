use thiserror::Error;

/// Contract violations raised by the analysis core.
///
/// These are programmer errors: they abort the frame that triggered them and
/// never leave persisted state half-updated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("size mismatch: expected {expected} values, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

impl PipelineError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }
}
