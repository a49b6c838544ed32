//! Binary glTF 2.0 writer.
//!
//! Layout: 12-byte header (`glTF`, version 2, total length), a JSON chunk
//! padded with spaces and a BIN chunk padded with zeros, both 4-byte
//! aligned. Every model root becomes a scene root node; meshes carry
//! POSITION (with min/max), NORMAL, TEXCOORD_0 and u32 indices when present.
//! Base-colour textures are embedded as PNG images. Lights are not written.
//!
//! The JSON chunk is a [`gltf::json::Root`], so the document types are the
//! same ones the GLB loader deserializes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use gltf::json::{
    self,
    accessor::{ComponentType, GenericComponentType, Type},
    buffer::Target,
    material::{PbrBaseColorFactor, PbrMetallicRoughness, StrengthFactor},
    mesh::{Mode, Semantic},
    validation::{Checked::Valid, USize64},
    Index,
};

use crate::scene::{Material, Mesh, Scene, SceneNode, Texture};

use super::ExportError;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: &[u8; 4] = b"JSON";
const CHUNK_BIN: &[u8; 4] = b"BIN\0";

struct Builder {
    root: json::Root,
    bin: Vec<u8>,
    /// Shared materials and textures are written once, keyed by allocation.
    materials: HashMap<*const Material, Index<json::Material>>,
    textures: HashMap<*const Texture, Index<json::Texture>>,
}

impl Builder {
    fn new() -> Self {
        let mut root = json::Root::default();
        root.asset.generator = Some(format!("modelview {}", env!("CARGO_PKG_VERSION")));
        Self {
            root,
            bin: Vec::new(),
            materials: HashMap::new(),
            textures: HashMap::new(),
        }
    }

    fn push_view(&mut self, bytes: &[u8], target: Option<Target>) -> Index<json::buffer::View> {
        pad_to_four(&mut self.bin, 0);
        let byte_offset = self.bin.len();
        self.bin.extend_from_slice(bytes);
        self.root.push(json::buffer::View {
            buffer: Index::new(0),
            byte_length: USize64::from(bytes.len()),
            byte_offset: Some(USize64::from(byte_offset)),
            byte_stride: None,
            name: None,
            target: target.map(Valid),
            extensions: None,
            extras: Default::default(),
        })
    }

    fn push_accessor(
        &mut self,
        bytes: &[u8],
        target: Target,
        component: ComponentType,
        kind: Type,
        count: usize,
        bounds: Option<(Vec3, Vec3)>,
    ) -> Index<json::Accessor> {
        let buffer_view = self.push_view(bytes, Some(target));
        let (min, max) = match bounds {
            Some((min, max)) => (
                Some(json::Value::from(min.to_array().to_vec())),
                Some(json::Value::from(max.to_array().to_vec())),
            ),
            None => (None, None),
        };
        self.root.push(json::Accessor {
            buffer_view: Some(buffer_view),
            byte_offset: None,
            count: USize64::from(count),
            component_type: Valid(GenericComponentType(component)),
            extensions: None,
            extras: Default::default(),
            type_: Valid(kind),
            min,
            max,
            name: None,
            normalized: false,
            sparse: None,
        })
    }

    fn vec3_accessor(&mut self, values: &[Vec3], bounds: bool) -> Index<json::Accessor> {
        let bytes: Vec<u8> = values
            .iter()
            .flat_map(|v| v.to_array())
            .flat_map(f32::to_le_bytes)
            .collect();
        let bounds = bounds.then(|| {
            let min = values.iter().fold(Vec3::splat(f32::INFINITY), |a, v| a.min(*v));
            let max = values.iter().fold(Vec3::splat(f32::NEG_INFINITY), |a, v| a.max(*v));
            (min, max)
        });
        self.push_accessor(
            &bytes,
            Target::ArrayBuffer,
            ComponentType::F32,
            Type::Vec3,
            values.len(),
            bounds,
        )
    }

    fn vec2_accessor(&mut self, values: &[Vec2]) -> Index<json::Accessor> {
        let bytes: Vec<u8> = values
            .iter()
            .flat_map(|v| v.to_array())
            .flat_map(f32::to_le_bytes)
            .collect();
        self.push_accessor(
            &bytes,
            Target::ArrayBuffer,
            ComponentType::F32,
            Type::Vec2,
            values.len(),
            None,
        )
    }

    fn index_accessor(&mut self, indices: &[u32]) -> Index<json::Accessor> {
        let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        self.push_accessor(
            &bytes,
            Target::ElementArrayBuffer,
            ComponentType::U32,
            Type::Scalar,
            indices.len(),
            None,
        )
    }

    fn texture(&mut self, texture: &Arc<Texture>) -> Index<json::Texture> {
        if let Some(&index) = self.textures.get(&Arc::as_ptr(texture)) {
            return index;
        }
        let buffer_view = self.push_view(&texture.png, None);
        let source = self.root.push(json::Image {
            buffer_view: Some(buffer_view),
            mime_type: Some(json::image::MimeType("image/png".into())),
            name: (!texture.source.is_empty()).then(|| texture.source.clone()),
            uri: None,
            extensions: None,
            extras: Default::default(),
        });
        let index = self.root.push(json::Texture {
            name: None,
            sampler: None,
            source,
            extensions: None,
            extras: Default::default(),
        });
        self.textures.insert(Arc::as_ptr(texture), index);
        index
    }

    fn material(&mut self, material: &Arc<Material>) -> Index<json::Material> {
        if let Some(&index) = self.materials.get(&Arc::as_ptr(material)) {
            return index;
        }
        let base_color_texture = material.map.as_ref().map(|t| json::texture::Info {
            index: self.texture(t),
            tex_coord: 0,
            extensions: None,
            extras: Default::default(),
        });
        let index = self.root.push(json::Material {
            name: (!material.name.is_empty()).then(|| material.name.clone()),
            pbr_metallic_roughness: PbrMetallicRoughness {
                base_color_factor: PbrBaseColorFactor(material.color),
                base_color_texture,
                metallic_factor: StrengthFactor(0.0),
                roughness_factor: StrengthFactor(1.0),
                ..Default::default()
            },
            ..Default::default()
        });
        self.materials.insert(Arc::as_ptr(material), index);
        index
    }

    fn mesh(&mut self, mesh: &Mesh) -> Option<Index<json::Mesh>> {
        if mesh.positions.is_empty() {
            return None;
        }
        let mut attributes = BTreeMap::new();
        attributes.insert(
            Valid(Semantic::Positions),
            self.vec3_accessor(&mesh.positions, true),
        );
        if let Some(normals) = mesh.normals.as_deref().filter(|_| mesh.has_normals()) {
            attributes.insert(Valid(Semantic::Normals), self.vec3_accessor(normals, false));
        }
        if let Some(uvs) = mesh
            .uvs
            .as_deref()
            .filter(|uv| uv.len() == mesh.positions.len())
        {
            attributes.insert(Valid(Semantic::TexCoords(0)), self.vec2_accessor(uvs));
        }
        let indices = mesh.indices.as_deref().map(|i| self.index_accessor(i));
        let material = mesh.material.as_ref().map(|m| self.material(m));

        Some(self.root.push(json::Mesh {
            extensions: None,
            extras: Default::default(),
            name: None,
            primitives: vec![json::mesh::Primitive {
                attributes,
                extensions: None,
                extras: Default::default(),
                indices,
                material,
                mode: Valid(Mode::Triangles),
                targets: None,
            }],
            weights: None,
        }))
    }

    fn node(&mut self, node: &SceneNode) -> Index<json::Node> {
        let mesh = node.mesh.as_ref().and_then(|m| self.mesh(m));
        let children: Vec<_> = node.children.iter().map(|c| self.node(c)).collect();
        let matrix = (node.transform != Mat4::IDENTITY).then(|| node.transform.to_cols_array());
        self.root.push(json::Node {
            name: (!node.name.is_empty()).then(|| node.name.clone()),
            matrix,
            mesh,
            children: (!children.is_empty()).then_some(children),
            ..Default::default()
        })
    }

    fn finish(mut self) -> Result<Vec<u8>, ExportError> {
        if !self.bin.is_empty() {
            pad_to_four(&mut self.bin, 0);
            self.root.push(json::Buffer {
                byte_length: USize64::from(self.bin.len()),
                name: None,
                uri: None,
                extensions: None,
                extras: Default::default(),
            });
        }
        let mut json = self.root.to_vec()?;
        pad_to_four(&mut json, b' ');

        let mut total = 12 + 8 + json.len();
        if !self.bin.is_empty() {
            total += 8 + self.bin.len();
        }
        let total_u32 = u32::try_from(total)
            .map_err(|_| ExportError::Encode(format!("GLB too large ({total} bytes)")))?;

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(GLB_MAGIC);
        out.extend_from_slice(&GLB_VERSION.to_le_bytes());
        out.extend_from_slice(&total_u32.to_le_bytes());
        write_chunk(&mut out, CHUNK_JSON, &json);
        if !self.bin.is_empty() {
            write_chunk(&mut out, CHUNK_BIN, &self.bin);
        }
        Ok(out)
    }
}

fn pad_to_four(bytes: &mut Vec<u8>, fill: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(fill);
    }
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    // Chunk lengths are bounded by the total, which was checked to fit u32.
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
}

/// Encode every model in `scene` as a single GLB file.
pub fn export_glb(scene: &Scene) -> Result<Vec<u8>, ExportError> {
    let mut builder = Builder::new();
    let nodes: Vec<_> = scene.models.iter().map(|m| builder.node(m)).collect();
    // A scene with no nodes serializes without its `nodes` field, which
    // readers reject; an empty export declares no scene at all.
    if !nodes.is_empty() {
        let default_scene = builder.root.push(json::Scene {
            extensions: None,
            extras: Default::default(),
            name: None,
            nodes,
        });
        builder.root.scene = Some(default_scene);
    }
    builder.finish()
}
