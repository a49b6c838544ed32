//! MTL material libraries.
//!
//! A library is parsed once up front so its textures can be decoded before
//! the OBJ geometry is read; the OBJ parser then binds `usemtl` names to the
//! preloaded materials.

use std::path::Path;
use std::sync::Arc;

use crate::scene::Material;

use super::textures::TextureHandlers;
use super::LoadError;

#[derive(Debug, Clone)]
struct Entry {
    material: Material,
    /// `map_Kd` reference, still unresolved.
    diffuse_map: Option<String>,
}

/// Parsed MTL file: materials in file order.
#[derive(Debug, Clone)]
pub struct MaterialLibrary {
    source: Vec<u8>,
    entries: Vec<Entry>,
}

impl MaterialLibrary {
    pub fn parse(bytes: Vec<u8>, name: &str) -> Result<Self, LoadError> {
        let (materials, _) = tobj::load_mtl_buf(&mut bytes.as_slice())
            .map_err(|e| LoadError::parse("MTL", name, e))?;

        let entries = materials
            .into_iter()
            .map(|m| {
                let [r, g, b] = m.diffuse.unwrap_or([1.0, 1.0, 1.0]);
                let alpha = m.dissolve.unwrap_or(1.0);
                Entry {
                    material: Material {
                        name: m.name,
                        color: [r, g, b, alpha],
                        map: None,
                    },
                    diffuse_map: m.diffuse_texture.as_deref().and_then(texture_file_name),
                }
            })
            .collect();

        Ok(Self {
            source: bytes,
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw MTL text, re-read by the OBJ parser to build its name table.
    pub(crate) fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decode every referenced diffuse texture relative to `base_dir`.
    ///
    /// Missing or undecodable textures are logged and skipped; the material
    /// keeps its colour. Returns the number of textures attached.
    pub fn preload(&mut self, handlers: &TextureHandlers, base_dir: Option<&Path>) -> usize {
        let mut loaded = 0;
        for entry in &mut self.entries {
            let Some(reference) = entry.diffuse_map.as_deref() else {
                continue;
            };
            let Some(dir) = base_dir else {
                tracing::warn!(
                    material = %entry.material.name,
                    texture = %reference,
                    "texture reference cannot be resolved for an in-memory material file"
                );
                continue;
            };
            match handlers.load_file(&dir.join(reference)) {
                Ok(texture) => {
                    entry.material.map = Some(Arc::new(texture));
                    loaded += 1;
                }
                Err(e) => tracing::warn!(
                    material = %entry.material.name,
                    texture = %reference,
                    "skipping texture: {e}"
                ),
            }
        }
        loaded
    }

    /// Materials in file order, shared so meshes can reference them.
    pub fn materials(&self) -> Vec<Arc<Material>> {
        self.entries
            .iter()
            .map(|e| Arc::new(e.material.clone()))
            .collect()
    }
}

/// Strip `map_Kd` options (`-bm 1 -o 0 0 ...`) and normalise separators,
/// keeping the file name at the end of the statement.
fn texture_file_name(statement: &str) -> Option<String> {
    statement
        .split_whitespace()
        .last()
        .map(|name| name.replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = "\
newmtl red
Kd 1 0 0

newmtl glass
Kd 0.5 0.5 1
d 0.25
map_Kd -bm 1 textures\\glass.png
";

    #[test]
    fn parses_colours_and_dissolve_in_file_order() {
        let lib = MaterialLibrary::parse(LIBRARY.as_bytes().to_vec(), "lib.mtl").expect("parse");
        let materials = lib.materials();
        assert_eq!(materials.len(), 2);
        assert_eq!(materials[0].name, "red");
        assert_eq!(materials[0].color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(materials[1].name, "glass");
        assert_eq!(materials[1].color, [0.5, 0.5, 1.0, 0.25]);
    }

    #[test]
    fn map_options_are_stripped_from_texture_references() {
        assert_eq!(
            texture_file_name("-bm 1 textures\\glass.png").as_deref(),
            Some("textures/glass.png")
        );
        assert_eq!(texture_file_name("   "), None);
    }

    #[test]
    fn missing_textures_are_skipped_not_fatal() {
        let mut lib =
            MaterialLibrary::parse(LIBRARY.as_bytes().to_vec(), "lib.mtl").expect("parse");
        let dir = std::env::temp_dir().join("modelview_mtl_missing_texture");
        let loaded = lib.preload(&TextureHandlers::default(), Some(&dir));
        assert_eq!(loaded, 0);
        assert!(lib.materials()[1].map.is_none());
    }

    #[test]
    fn textures_next_to_the_library_are_attached() {
        let dir = std::env::temp_dir().join("modelview_mtl_texture_fixture");
        std::fs::create_dir_all(dir.join("textures")).expect("mkdir");
        let pixels = image::RgbaImage::from_pixel(4, 2, image::Rgba([0, 128, 255, 255]));
        pixels.save(dir.join("textures/glass.png")).expect("write png");

        let mut lib =
            MaterialLibrary::parse(LIBRARY.as_bytes().to_vec(), "lib.mtl").expect("parse");
        let loaded = lib.preload(&TextureHandlers::default(), Some(&dir));
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(loaded, 1);
        let map = lib.materials()[1].map.clone().expect("texture attached");
        assert_eq!((map.width, map.height), (4, 2));
        assert_eq!(map.source, "glass.png");
    }
}
