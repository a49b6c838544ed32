//! Wavefront OBJ geometry.

use std::cell::Cell;
use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::scene::{Material, Mesh, SceneNode};

use super::mtl::MaterialLibrary;
use super::LoadError;

/// Parse OBJ text into a group with one child per object.
///
/// With a `library`, `usemtl` statements bind to its materials whether or
/// not the OBJ names a `mtllib`; without one, `mtllib` lines are ignored and
/// meshes are left without a material.
pub fn parse_obj(
    bytes: &[u8],
    name: &str,
    library: Option<&MaterialLibrary>,
) -> Result<SceneNode, LoadError> {
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };

    let (models, materials) = match library {
        Some(library) => {
            // The paired library stands in for whatever the OBJ names, so it
            // is handed out once; later `mtllib` lines contribute nothing.
            let source = with_mtllib(bytes);
            let served = Cell::new(false);
            let parsed = tobj::load_obj_buf(&mut source.as_slice(), &options, |_| {
                if served.replace(true) {
                    Ok((Vec::new(), Default::default()))
                } else {
                    tobj::load_mtl_buf(&mut library.source())
                }
            });
            (parsed, library.materials())
        }
        None => (
            tobj::load_obj_buf(&mut &bytes[..], &options, |_| {
                Err(tobj::LoadError::OpenFileFailed)
            }),
            Vec::new(),
        ),
    };
    let (models, _) = models.map_err(|e| LoadError::parse("OBJ", name, e))?;

    let mut root = SceneNode::group(stem(name));
    for model in models {
        let mesh = convert_mesh(&model.mesh, &materials);
        if mesh.positions.is_empty() {
            continue;
        }
        root.add_child(SceneNode::with_mesh(model.name, mesh));
    }
    Ok(root)
}

fn convert_mesh(mesh: &tobj::Mesh, materials: &[Arc<Material>]) -> Mesh {
    let positions: Vec<Vec3> = mesh
        .positions
        .chunks_exact(3)
        .map(|p| Vec3::new(p[0], p[1], p[2]))
        .collect();

    let has_normals = !mesh.normals.is_empty() && mesh.normals.len() == mesh.positions.len();
    let normals = has_normals.then(|| {
        mesh.normals
            .chunks_exact(3)
            .map(|n| Vec3::new(n[0], n[1], n[2]))
            .collect()
    });
    let uvs = (!mesh.texcoords.is_empty() && mesh.texcoords.len() / 2 == positions.len())
        .then(|| {
            mesh.texcoords
                .chunks_exact(2)
                .map(|t| Vec2::new(t[0], t[1]))
                .collect()
        });

    Mesh {
        positions,
        normals,
        uvs,
        indices: Some(mesh.indices.clone()),
        material: mesh
            .material_id
            .and_then(|id| materials.get(id))
            .cloned(),
    }
}

/// OBJ source guaranteed to request a material library before any faces.
fn with_mtllib(bytes: &[u8]) -> Vec<u8> {
    let names_library = bytes
        .split(|&b| b == b'\n')
        .any(|line| {
            line.iter()
                .position(|b| !b.is_ascii_whitespace())
                .is_some_and(|start| line[start..].starts_with(b"mtllib"))
        });
    if names_library {
        return bytes.to_vec();
    }
    let mut source = b"mtllib paired.mtl\n".to_vec();
    source.extend_from_slice(bytes);
    source
}

fn stem(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}
