//! Procedural meshes in the packed vertex format

use glam::{Vec2, Vec3};
use std::f32::consts::PI;

use crate::backend::{BufferHandle, GpuBackend};
use crate::scene::{upload_geometry, IndexBuffer};
use crate::vertex::MeshVertex;

/// Generated geometry in the same format imported meshes use
#[derive(Clone, Debug, Default)]
pub struct PackedMesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl PackedMesh {
    /// Generate a UV sphere (used for light gizmos).
    ///
    /// `stacks` run pole to pole along +Z, `sectors` around it. The pole rows
    /// emit a single triangle per sector instead of a degenerate quad.
    pub fn sphere(radius: f32, stacks: u32, sectors: u32) -> Self {
        let stacks = stacks.max(2);
        let sectors = sectors.max(3);
        let mut vertices = Vec::with_capacity(((stacks + 1) * (sectors + 1)) as usize);
        let mut indices = Vec::new();

        let sector_step = 2.0 * PI / sectors as f32;
        let stack_step = PI / stacks as f32;

        for i in 0..=stacks {
            let stack_angle = PI / 2.0 - i as f32 * stack_step;
            let xy = radius * stack_angle.cos();
            let z = radius * stack_angle.sin();

            for j in 0..=sectors {
                let sector_angle = j as f32 * sector_step;
                let position = Vec3::new(xy * sector_angle.cos(), xy * sector_angle.sin(), z);
                let normal = position / radius;
                // d(position)/d(sector_angle), undefined at the poles
                let tangent = Vec3::new(-sector_angle.sin(), sector_angle.cos(), 0.0);
                let uv = Vec2::new(j as f32 / sectors as f32, i as f32 / stacks as f32);

                vertices.push(MeshVertex::new(position, normal, tangent.extend(1.0), uv));
            }
        }

        for i in 0..stacks {
            let mut k1 = i * (sectors + 1);
            let mut k2 = k1 + sectors + 1;

            for _ in 0..sectors {
                if i != 0 {
                    indices.extend([k1, k2, k1 + 1]);
                }
                if i != stacks - 1 {
                    indices.extend([k1 + 1, k2, k2 + 1]);
                }
                k1 += 1;
                k2 += 1;
            }
        }

        Self { vertices, indices }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Upload to the GPU, returning vertex and index buffers
    pub fn upload(&self, backend: &mut dyn GpuBackend) -> (BufferHandle, IndexBuffer) {
        upload_geometry(backend, &self.vertices, &self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use approx::assert_abs_diff_eq;

    #[test]
    fn sphere_counts() {
        let sphere = PackedMesh::sphere(1.0, 8, 16);
        assert_eq!(sphere.vertices.len(), 9 * 17);
        // two pole rows of single triangles, the rest quads
        assert_eq!(sphere.triangle_count(), 16 * 2 * (8 - 1));
        let max = sphere.indices.iter().copied().max().unwrap_or(0);
        assert!((max as usize) < sphere.vertices.len());
    }

    #[test]
    fn sphere_vertices_sit_on_radius() {
        let sphere = PackedMesh::sphere(2.0, 6, 12);
        for v in &sphere.vertices {
            assert_abs_diff_eq!(v.position().truncate().length(), 2.0, epsilon = 0.01);
            assert_abs_diff_eq!(v.normal().length(), 1.0, epsilon = 0.03);
        }
    }

    #[test]
    fn sphere_uploads_with_short_indices() {
        let mut backend = HeadlessBackend::new();
        let (_, index) = PackedMesh::sphere(1.0, 4, 8).upload(&mut backend);
        assert!(index.is_short());
        assert_eq!(backend.buffers.len(), 2);
    }
}
