use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("invalid base url '{0}': expected an absolute file url")]
    InvalidBaseUrl(String),
    #[error("macro '{0}' is not registered")]
    MacroNotFound(String),
    #[error("blocking task failed: {0}")]
    Join(String),
}

impl SandboxError {
    /// True when the underlying cause is a missing file or directory.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SandboxError::Io(err) if is_not_found_kind(err))
    }
}

/// `NotADirectory` shows up when an intermediate component is a regular
/// file, which means the target cannot exist either.
pub(crate) fn is_not_found_kind(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

pub type Result<T> = std::result::Result<T, SandboxError>;
