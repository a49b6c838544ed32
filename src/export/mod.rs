//! Scene export.
//!
//! ```text
//! export/
//! ├── glb.rs : binary glTF 2.0 writer
//! └── sink.rs: FileSink delivery (atomic write into the download dir)
//! ```

pub mod glb;
pub mod sink;

pub use glb::export_glb;
pub use sink::{Delivery, DownloadDirSink, FileSink};

/// Errors raised while encoding or delivering an export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The glTF JSON document could not be serialized.
    #[error("cannot encode glTF document: {0}")]
    Encode(String),

    /// The encoded file could not be written to its destination.
    #[error("cannot write {path}: {message}")]
    Write { path: String, message: String },
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encode(e.to_string())
    }
}
