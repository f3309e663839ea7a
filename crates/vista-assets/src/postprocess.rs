//! Scene normalization run between reading a file and importing it

use glam::{Vec2, Vec3};
use tracing::{debug, warn};
use vista_core::Aabb;

use crate::scene::{Scene, SceneMesh, Topology};

/// Post-process steps to run. The default enables all of them, which is what
/// the importer expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostProcess {
    pub triangulate: bool,
    pub flip_uvs: bool,
    pub generate_normals: bool,
    pub tangent_space: bool,
    pub bounding_boxes: bool,
}

impl Default for PostProcess {
    fn default() -> Self {
        Self {
            triangulate: true,
            flip_uvs: true,
            generate_normals: true,
            tangent_space: true,
            bounding_boxes: true,
        }
    }
}

/// Run the enabled steps over every mesh in the scene.
pub fn apply(scene: &mut Scene, steps: &PostProcess) {
    for mesh in &mut scene.meshes {
        if steps.triangulate {
            triangulate(mesh);
        }
        if steps.flip_uvs {
            flip_uvs(mesh);
        }
        if steps.generate_normals {
            generate_normals(mesh);
        }
        if steps.tangent_space {
            calculate_tangent_space(mesh);
        }
        if steps.bounding_boxes {
            mesh.bounds = Aabb::from_points(mesh.positions.iter().copied());
        }
    }
}

/// Rewrite strips and fans as triangle lists. Point and line primitives have
/// no surface and are emptied.
pub fn triangulate(mesh: &mut SceneMesh) {
    let indices = std::mem::take(&mut mesh.indices);
    mesh.indices = match mesh.topology {
        Topology::Triangles => indices,
        Topology::TriangleStrip => {
            let mut out = Vec::with_capacity(indices.len().saturating_sub(2) * 3);
            for (i, w) in indices.windows(3).enumerate() {
                // keep winding consistent on odd triangles
                if i % 2 == 0 {
                    out.extend([w[0], w[1], w[2]]);
                } else {
                    out.extend([w[1], w[0], w[2]]);
                }
            }
            out
        }
        Topology::TriangleFan => {
            let mut out = Vec::with_capacity(indices.len().saturating_sub(2) * 3);
            if let Some((&first, rest)) = indices.split_first() {
                for w in rest.windows(2) {
                    out.extend([first, w[0], w[1]]);
                }
            }
            out
        }
        Topology::Points | Topology::Lines | Topology::LineLoop | Topology::LineStrip => {
            warn!(
                "Mesh '{}' uses {:?} primitives, dropping its {} indices",
                mesh.name,
                mesh.topology,
                indices.len()
            );
            Vec::new()
        }
    };
    mesh.topology = Topology::Triangles;
}

pub fn flip_uvs(mesh: &mut SceneMesh) {
    if let Some(uvs) = &mut mesh.uvs {
        for uv in uvs.iter_mut() {
            uv.y = 1.0 - uv.y;
        }
    }
}

/// Area-weighted smooth normals for meshes that have none.
pub fn generate_normals(mesh: &mut SceneMesh) {
    if mesh.normals.is_some() || mesh.topology != Topology::Triangles {
        return;
    }

    let mut normals = vec![Vec3::ZERO; mesh.positions.len()];
    for tri in mesh.indices.chunks_exact(3) {
        let Some([a, b, c]) = triangle_positions(&mesh.positions, tri) else {
            continue;
        };
        // unnormalized, so larger faces weigh more
        let face = (b - a).cross(c - a);
        for &i in tri {
            normals[i as usize] += face;
        }
    }

    for n in &mut normals {
        *n = n.try_normalize().unwrap_or(Vec3::Z);
    }

    debug!("Generated normals for mesh '{}'", mesh.name);
    mesh.normals = Some(normals);
}

/// Per-vertex tangents and bitangents derived from the first UV channel.
///
/// Needs normals and UVs. Meshes that already carry a tangent frame are left
/// alone.
pub fn calculate_tangent_space(mesh: &mut SceneMesh) {
    if mesh.tangents.is_some() && mesh.bitangents.is_some() {
        return;
    }
    let (Some(normals), Some(uvs)) = (&mesh.normals, &mesh.uvs) else {
        return;
    };
    if mesh.topology != Topology::Triangles {
        return;
    }

    let count = mesh.positions.len();
    if normals.len() != count || uvs.len() != count {
        warn!(
            "Skipping tangent space for mesh '{}': attribute streams differ in length",
            mesh.name
        );
        return;
    }
    let mut tangents = vec![Vec3::ZERO; count];
    let mut bitangents = vec![Vec3::ZERO; count];

    for tri in mesh.indices.chunks_exact(3) {
        let Some([p0, p1, p2]) = triangle_positions(&mesh.positions, tri) else {
            continue;
        };
        let (Some(&t0), Some(&t1), Some(&t2)) = (
            uvs.get(tri[0] as usize),
            uvs.get(tri[1] as usize),
            uvs.get(tri[2] as usize),
        ) else {
            continue;
        };

        let (e1, e2) = (p1 - p0, p2 - p0);
        let (d1, d2): (Vec2, Vec2) = (t1 - t0, t2 - t0);
        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (e1 * d2.y - e2 * d1.y) * r;
        let bitangent = (e2 * d1.x - e1 * d2.x) * r;

        for &i in tri {
            tangents[i as usize] += tangent;
            bitangents[i as usize] += bitangent;
        }
    }

    for i in 0..count {
        let n = normals[i];
        // Gram-Schmidt against the normal
        let t = (tangents[i] - n * n.dot(tangents[i]))
            .try_normalize()
            .unwrap_or_else(|| n.any_orthonormal_vector());
        let b = (bitangents[i] - n * n.dot(bitangents[i]))
            .try_normalize()
            .unwrap_or_else(|| n.cross(t));
        tangents[i] = t;
        bitangents[i] = b;
    }

    mesh.tangents = Some(tangents);
    mesh.bitangents = Some(bitangents);
}

fn triangle_positions(positions: &[Vec3], tri: &[u32]) -> Option<[Vec3; 3]> {
    Some([
        *positions.get(tri[0] as usize)?,
        *positions.get(tri[1] as usize)?,
        *positions.get(tri[2] as usize)?,
    ])
}
