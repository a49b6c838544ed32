//! Files delivered by one drop gesture.
//!
//! A [`DroppedFile`] pairs the user-visible file name with an opaque
//! [`FileHandle`] that a parser can fetch bytes from. The name, not the
//! handle, drives format detection.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::extension::classify;

/// Loadable reference to the contents of a dropped file.
#[derive(Debug, Clone)]
pub enum FileHandle {
    /// A file on the local filesystem (desktop drag-and-drop).
    Path(PathBuf),
    /// Bytes already read by the webview.
    Bytes(Arc<[u8]>),
}

/// One dropped file: display name plus loadable handle.
#[derive(Debug, Clone)]
pub struct DroppedFile {
    pub name: String,
    pub handle: FileHandle,
}

impl DroppedFile {
    /// Build a dropped file from a filesystem path, using the final path
    /// component as its name.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            handle: FileHandle::Path(path),
        }
    }

    /// Build a dropped file from bytes that are already in memory.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            handle: FileHandle::Bytes(bytes.into()),
        }
    }

    /// Classified extension of this file's name (see [`classify`]).
    pub fn extension(&self) -> String {
        classify(&self.name)
    }

    /// Directory that relative references inside the file (textures, linked
    /// materials) resolve against. In-memory files have none.
    pub fn base_dir(&self) -> Option<&Path> {
        match &self.handle {
            FileHandle::Path(path) => path.parent(),
            FileHandle::Bytes(_) => None,
        }
    }

    /// Read the full contents behind the handle.
    pub async fn fetch(&self) -> std::io::Result<Vec<u8>> {
        match &self.handle {
            FileHandle::Path(path) => tokio::fs::read(path).await,
            FileHandle::Bytes(bytes) => Ok(bytes.to_vec()),
        }
    }
}

/// Ordered files from a single drop gesture.
#[derive(Debug, Clone, Default)]
pub struct DropSet {
    files: Vec<DroppedFile>,
}

impl DropSet {
    pub fn new(files: Vec<DroppedFile>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[DroppedFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Distinct classified extensions across all files.
    pub fn extensions(&self) -> BTreeSet<String> {
        self.files.iter().map(DroppedFile::extension).collect()
    }

    /// First file whose classified extension equals `ext`.
    pub fn find(&self, ext: &str) -> Option<&DroppedFile> {
        self.files.iter().find(|f| f.extension() == ext)
    }
}

impl From<Vec<DroppedFile>> for DropSet {
    fn from(files: Vec<DroppedFile>) -> Self {
        Self::new(files)
    }
}
