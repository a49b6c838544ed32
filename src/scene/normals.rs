//! Vertex normal repair for meshes that arrive without normals.

use glam::Vec3;

use super::node::{Mesh, SceneNode};

/// Compute smooth vertex normals for `mesh` in place.
///
/// Indexed meshes accumulate each face normal onto its three vertices and
/// normalise the sum; non-indexed meshes get one flat normal per triangle.
/// Degenerate faces contribute nothing and isolated vertices keep a zero
/// normal.
pub fn compute_vertex_normals(mesh: &mut Mesh) {
    let positions = &mesh.positions;
    let mut normals = vec![Vec3::ZERO; positions.len()];

    let face_normal = |a: Vec3, b: Vec3, c: Vec3| (c - b).cross(a - b);

    match &mesh.indices {
        Some(indices) => {
            for tri in indices.chunks_exact(3) {
                let [ia, ib, ic] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
                let (Some(&a), Some(&b), Some(&c)) =
                    (positions.get(ia), positions.get(ib), positions.get(ic))
                else {
                    continue;
                };
                let n = face_normal(a, b, c);
                normals[ia] += n;
                normals[ib] += n;
                normals[ic] += n;
            }
        }
        None => {
            for (i, tri) in positions.chunks_exact(3).enumerate() {
                let n = face_normal(tri[0], tri[1], tri[2]);
                normals[i * 3..i * 3 + 3].fill(n);
            }
        }
    }

    for n in &mut normals {
        *n = n.normalize_or_zero();
    }
    mesh.normals = Some(normals);
}

/// Fill in normals for every mesh under `node` that lacks them.
///
/// Returns the number of meshes repaired.
pub fn repair_normals(node: &mut SceneNode) -> usize {
    let mut repaired = 0;
    node.traverse_meshes_mut(&mut |mesh| {
        if !mesh.has_normals() {
            compute_vertex_normals(mesh);
            repaired += 1;
        }
    });
    repaired
}
