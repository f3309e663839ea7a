//! Vertex deduplication and vertex-cache reordering
//!
//! Runs after quantization, so vertices that only differed below the packed
//! precision collapse into one.

use tracing::{debug, warn};

use crate::vertex::MeshVertex;

/// Post-transform cache size used when reporting ACMR.
const CACHE_SIZE: u32 = 16;

/// Deduplicated vertex buffer and its reordered triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptimizedMesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

/// Before/after numbers for one optimized mesh.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OptimizeStats {
    pub vertices_in: usize,
    pub vertices_out: usize,
    pub triangles: usize,
    /// Average cache miss ratio (transformed vertices per triangle)
    pub acmr_before: f32,
    pub acmr_after: f32,
}

/// Deduplicate vertices by exact bitwise equality of the packed record, then
/// reorder triangles for post-transform cache locality.
///
/// Triangles are only permuted, never rewound. Empty vertex or index input
/// yields an empty mesh.
pub fn optimize_mesh(vertices: &[MeshVertex], indices: &[u32]) -> OptimizedMesh {
    optimize_mesh_with_stats(vertices, indices).0
}

/// Same as [`optimize_mesh`], also returning cache statistics.
pub fn optimize_mesh_with_stats(
    vertices: &[MeshVertex],
    indices: &[u32],
) -> (OptimizedMesh, OptimizeStats) {
    if vertices.is_empty() || indices.is_empty() {
        return (OptimizedMesh::default(), OptimizeStats::default());
    }

    let indices = valid_triangles(indices, vertices.len());
    if indices.is_empty() {
        return (OptimizedMesh::default(), OptimizeStats::default());
    }

    let acmr_before =
        meshopt::analyze_vertex_cache(&indices, vertices.len(), CACHE_SIZE, 0, 0).acmr;

    let (unique_count, remap) = meshopt::generate_vertex_remap(vertices, Some(&indices));
    let remapped = meshopt::remap_index_buffer(Some(&indices), vertices.len(), &remap);
    let compact = meshopt::remap_vertex_buffer(vertices, unique_count, &remap);
    let reordered = meshopt::optimize_vertex_cache(&remapped, unique_count);

    let acmr_after = meshopt::analyze_vertex_cache(&reordered, unique_count, CACHE_SIZE, 0, 0).acmr;

    let stats = OptimizeStats {
        vertices_in: vertices.len(),
        vertices_out: unique_count,
        triangles: reordered.len() / 3,
        acmr_before,
        acmr_after,
    };
    debug!(
        "Optimized mesh: {} -> {} vertices, {} triangles, ACMR {:.3} -> {:.3}",
        stats.vertices_in, stats.vertices_out, stats.triangles, acmr_before, acmr_after
    );

    (
        OptimizedMesh {
            vertices: compact,
            indices: reordered,
        },
        stats,
    )
}

/// Drop a trailing partial triangle and any triangle that references a vertex
/// outside the buffer. meshoptimizer asserts on both.
fn valid_triangles(indices: &[u32], vertex_count: usize) -> Vec<u32> {
    let whole = indices.len() - indices.len() % 3;
    if whole != indices.len() {
        warn!(
            "Index count {} is not a multiple of 3, dropping trailing indices",
            indices.len()
        );
    }

    let mut out = Vec::with_capacity(whole);
    let mut dropped = 0usize;
    for tri in indices[..whole].chunks_exact(3) {
        if tri.iter().all(|&i| (i as usize) < vertex_count) {
            out.extend_from_slice(tri);
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        warn!("Dropped {} triangles with out-of-range indices", dropped);
    }
    out
}
