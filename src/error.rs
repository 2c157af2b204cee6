use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Path error: {0}")]
    Path(String),

    /// The operation was cancelled cooperatively. Not a user-facing failure:
    /// callers discard partial results and carry on.
    #[error("operation cancelled")]
    Cancelled,

    /// The user declined a threshold override and asked to stop the scan.
    #[error("scan aborted at threshold: {0}")]
    ThresholdAborted(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TreeError {
    /// Returns true for the cooperative-stop variants whose partial results
    /// are discarded rather than reported.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::ThresholdAborted(_))
    }
}

pub type Result<T> = std::result::Result<T, TreeError>;
