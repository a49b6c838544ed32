//! Delivery of exported files.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::ExportError;

/// Where an export ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub name: String,
    /// Human-readable destination (a filesystem path for the desktop sink).
    pub location: String,
    pub bytes: usize,
}

/// Receives a finished export.
pub trait FileSink: Send + Sync {
    fn deliver(&self, name: &str, bytes: &[u8]) -> Result<Delivery, ExportError>;
}

/// Writes exports into a directory, by default the user's download folder.
#[derive(Debug, Clone)]
pub struct DownloadDirSink {
    dir: PathBuf,
}

impl DownloadDirSink {
    /// Sink targeting the OS download directory, or the temp dir when the
    /// platform reports none.
    pub fn new() -> Self {
        let dir = dirs::download_dir().unwrap_or_else(std::env::temp_dir);
        Self { dir }
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for DownloadDirSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSink for DownloadDirSink {
    /// Write `<dir>/<name>.tmp`, then rename it over `<dir>/<name>`. On any
    /// failure the temp file is removed and an existing file is untouched.
    fn deliver(&self, name: &str, bytes: &[u8]) -> Result<Delivery, ExportError> {
        let path = self.dir.join(name);
        let tmp_path = self.dir.join(format!("{name}.tmp"));
        let write_error = |e: std::io::Error| ExportError::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        std::fs::create_dir_all(&self.dir).map_err(write_error)?;
        if let Err(e) = std::fs::write(&tmp_path, bytes) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(write_error(e));
        }
        std::fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            write_error(e)
        })?;

        tracing::info!(path = %path.display(), bytes = bytes.len(), "export delivered");
        Ok(Delivery {
            name: name.to_string(),
            location: path.display().to_string(),
            bytes: bytes.len(),
        })
    }
}
