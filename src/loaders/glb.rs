//! Binary glTF (`.glb`) import.

use std::collections::HashSet;
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use gltf::image::Format;
use gltf::mesh::Mode;
use image::RgbaImage;

use crate::scene::{Material, Mesh, SceneNode, Texture, MAX_NODE_DEPTH};

use super::textures::encode_png;
use super::{LoadError, SceneAsset};

/// Parse a GLB container. The default scene is used when one is declared,
/// otherwise the first scene; a document with no scenes yields an empty
/// group.
pub fn parse_glb(bytes: &[u8], name: &str) -> Result<SceneAsset, LoadError> {
    let (document, buffers, images) =
        gltf::import_slice(bytes).map_err(|e| LoadError::parse("GLB", name, e))?;

    let textures: Vec<Option<Arc<Texture>>> = images
        .iter()
        .zip(document.images())
        .map(|(data, image)| {
            let source = image
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("image_{}", image.index()));
            match decode_image(data).and_then(|pixels| encode_png(&source, &pixels)) {
                Ok(texture) => Some(Arc::new(texture)),
                Err(e) => {
                    tracing::warn!(image = %source, "skipping embedded texture: {e}");
                    None
                }
            }
        })
        .collect();

    let materials: Vec<Arc<Material>> = document
        .materials()
        .map(|m| Arc::new(convert_material(&m, &textures)))
        .collect();

    let buffers: Vec<&[u8]> = buffers.iter().map(|b| b.0.as_slice()).collect();
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next());

    let mut root = SceneNode::group(
        scene
            .as_ref()
            .and_then(|s| s.name())
            .unwrap_or("Scene"),
    );
    if let Some(scene) = &scene {
        let mut walk = NodeWalk {
            buffers: &buffers,
            materials: &materials,
            seen: HashSet::new(),
        };
        for node in scene.nodes() {
            let node = walk
                .convert(&node, 0)
                .map_err(|e| LoadError::parse("GLB", name, e))?;
            root.add_child(node);
        }
    }

    Ok(SceneAsset {
        scene: root,
        scene_count: document.scenes().len(),
    })
}

fn convert_material(material: &gltf::Material, textures: &[Option<Arc<Texture>>]) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let map = pbr
        .base_color_texture()
        .and_then(|info| textures.get(info.texture().source().index()))
        .and_then(Clone::clone);
    Material {
        name: material.name().unwrap_or_default().to_string(),
        color: pbr.base_color_factor(),
        map,
    }
}

/// Node hierarchy conversion. glTF requires a strict tree, so a node seen
/// twice (a cycle or a shared child) is rejected.
struct NodeWalk<'a> {
    buffers: &'a [&'a [u8]],
    materials: &'a [Arc<Material>],
    seen: HashSet<usize>,
}

impl NodeWalk<'_> {
    fn convert(&mut self, node: &gltf::Node, depth: usize) -> Result<SceneNode, String> {
        if depth >= MAX_NODE_DEPTH {
            return Err(format!("node hierarchy is deeper than {MAX_NODE_DEPTH} levels"));
        }
        if !self.seen.insert(node.index()) {
            return Err(format!("node {} has more than one parent", node.index()));
        }

        let transform = Mat4::from_cols_array_2d(&node.transform().matrix());
        let mut out = SceneNode::group(node.name().unwrap_or_default()).with_transform(transform);

        if let Some(mesh) = node.mesh() {
            let mut primitives: Vec<Mesh> = mesh
                .primitives()
                .filter_map(|p| convert_primitive(&p, self.buffers, self.materials))
                .collect();
            if primitives.len() == 1 {
                out.mesh = primitives.pop();
            } else {
                let mesh_name = mesh.name().unwrap_or("mesh");
                for (i, primitive) in primitives.into_iter().enumerate() {
                    out.add_child(SceneNode::with_mesh(format!("{mesh_name}_{i}"), primitive));
                }
            }
        }

        for child in node.children() {
            out.add_child(self.convert(&child, depth + 1)?);
        }
        Ok(out)
    }
}

fn convert_primitive(
    primitive: &gltf::Primitive,
    buffers: &[&[u8]],
    materials: &[Arc<Material>],
) -> Option<Mesh> {
    if primitive.mode() != Mode::Triangles {
        tracing::debug!(mode = ?primitive.mode(), "skipping non-triangle primitive");
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).copied());
    let positions: Vec<Vec3> = reader.read_positions()?.map(Vec3::from).collect();

    Some(Mesh {
        positions,
        normals: reader.read_normals().map(|n| n.map(Vec3::from).collect()),
        uvs: reader
            .read_tex_coords(0)
            .map(|t| t.into_f32().map(Vec2::from).collect()),
        indices: reader.read_indices().map(|i| i.into_u32().collect()),
        material: primitive
            .material()
            .index()
            .and_then(|i| materials.get(i))
            .cloned(),
    })
}

/// Expand decoded glTF image data to RGBA8.
fn decode_image(data: &gltf::image::Data) -> Result<RgbaImage, String> {
    let pixels: Vec<u8> = match data.format {
        Format::R8G8B8A8 => data.pixels.clone(),
        Format::R8G8B8 => data
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8 => data
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        Format::R8 => data.pixels.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        other => return Err(format!("unsupported pixel format {other:?}")),
    };
    RgbaImage::from_raw(data.width, data.height, pixels)
        .ok_or_else(|| "pixel buffer does not match image size".to_string())
}
