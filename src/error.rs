//! Application-level error type returned by all Tauri command handlers.
//!
//! `ViewerError` is serialized to `{ kind, message }` JSON payloads so the
//! frontend can pattern-match on a stable `kind` string. Every failure is
//! reported once and leaves the viewer interactive.

use crate::export::ExportError;
use crate::format::UnsupportedDrop;
use crate::loaders::LoadError;

/// Top-level error returned by Tauri command handlers.
///
/// Serialized with serde's adjacently-tagged representation:
/// `{ "kind": "<variant>", "message": "<human-readable text>" }`
///
/// The TypeScript counterpart is:
/// ```ts
/// type ViewerError = { kind: string; message?: string };
/// ```
#[derive(Debug, thiserror::Error, serde::Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum ViewerError {
    /// The dropped files match no supported format; nothing was loaded.
    #[error("{0}")]
    UnsupportedFormat(String),

    /// A parser rejected the file; the inner message comes from [`LoadError`].
    #[error("{0}")]
    ParseFailure(String),

    /// Another drop is still being loaded.
    #[error("a model is already loading")]
    LoadInProgress,

    /// The scene could not be exported.
    #[error("{0}")]
    Export(String),

    /// A generic I/O error; the inner [`std::io::Error`] is converted to a
    /// string at the system boundary so it remains serializable.
    #[error("{0}")]
    Io(String),
}

impl From<LoadError> for ViewerError {
    /// Every loader failure surfaces as [`ViewerError::ParseFailure`].
    fn from(e: LoadError) -> Self {
        Self::ParseFailure(e.to_string())
    }
}

impl From<UnsupportedDrop> for ViewerError {
    fn from(e: UnsupportedDrop) -> Self {
        Self::UnsupportedFormat(e.to_string())
    }
}

impl From<ExportError> for ViewerError {
    fn from(e: ExportError) -> Self {
        Self::Export(e.to_string())
    }
}

impl From<std::io::Error> for ViewerError {
    /// Convert an [`std::io::Error`] into an [`ViewerError::Io`].
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
