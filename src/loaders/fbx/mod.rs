//! Autodesk FBX import (binary encoding only).
//!
//! ```text
//! fbx/
//! ├── reader.rs: node-record reader (32/64-bit headers, zlib arrays)
//! └── scene.rs : Objects + Connections → scene graph
//! ```
//!
//! Normals are left to the repair pass that runs before attach.

pub mod reader;
pub mod scene;

use crate::scene::SceneNode;

use super::LoadError;

/// Parse a binary FBX file. ASCII FBX is rejected with a parse error.
pub fn parse_fbx(bytes: &[u8], name: &str) -> Result<SceneNode, LoadError> {
    if !reader::is_binary(bytes) {
        let message = if looks_ascii(bytes) {
            "ASCII FBX files are not supported"
        } else {
            "not an FBX file"
        };
        return Err(LoadError::parse("FBX", name, message));
    }

    let document = reader::parse_binary(bytes).map_err(|e| LoadError::parse("FBX", name, e))?;
    tracing::debug!(file = %name, version = document.version, "read binary FBX");

    let root_name = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    scene::build_scene(&document, root_name).map_err(|e| LoadError::parse("FBX", name, e))
}

fn looks_ascii(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]);
    head.trim_start().starts_with("; FBX") || head.contains("FBXHeaderExtension")
}
