//! Vista Render - GPU-facing data for the Vista viewer
//!
//! Owns the single packed vertex format every imported mesh is encoded into,
//! the mesh optimizer that deduplicates and reorders those vertices, and the
//! `GpuBackend` seam through which buffers and textures are created. The
//! graphics API itself lives behind that trait.

pub mod backend;
pub mod handle;
pub mod mesh;
pub mod optimize;
pub mod scene;
pub mod vertex;

pub use backend::{
    BufferHandle, BufferUsage, CompressedFormat, GpuBackend, GpuTexture, HeadlessBackend,
    TextureUpload,
};
pub use handle::TextureHandle;
pub use mesh::PackedMesh;
pub use optimize::{optimize_mesh, optimize_mesh_with_stats, OptimizeStats, OptimizedMesh};
pub use scene::{
    upload_geometry, FrameConstants, IndexBuffer, ObjectConstants, RenderMesh, TEXTURE_SLOT_COUNT,
};
pub use vertex::{encode_vertices, MeshVertex, VertexAttributes};
