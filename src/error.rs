//! Typed failures raised by the library scanner.

use std::path::PathBuf;
use thiserror::Error;

/// Library scan errors. Per-folder problems are logged and skipped;
/// only root-level problems surface here.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Library root does not exist
    #[error("Library path not found: {0}")]
    RootNotFound(PathBuf),

    /// Library root exists but is not a directory
    #[error("Library path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Library root could not be read at all
    #[error("Library path unreadable {0}: {1}")]
    Unreadable(PathBuf, String),
}
