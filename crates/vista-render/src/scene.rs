//! Render-side descriptors consumed by the frame loop

use glam::{Mat4, Vec3};
use vista_core::{Aabb, CameraParams, Color};

use crate::backend::{BufferHandle, BufferUsage, GpuBackend, GpuTexture};
use crate::handle::TextureHandle;
use crate::vertex::MeshVertex;

/// Number of material texture slots per mesh.
pub const TEXTURE_SLOT_COUNT: usize = 6;

/// Index buffer with the narrowest element type that fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBuffer {
    U16(BufferHandle),
    U32(BufferHandle),
}

impl IndexBuffer {
    pub fn handle(&self) -> BufferHandle {
        match self {
            IndexBuffer::U16(h) | IndexBuffer::U32(h) => *h,
        }
    }

    pub fn is_short(&self) -> bool {
        matches!(self, IndexBuffer::U16(_))
    }
}

/// Upload a vertex/index pair. Indices are narrowed to 16 bits when every
/// index fits.
pub fn upload_geometry(
    backend: &mut dyn GpuBackend,
    vertices: &[MeshVertex],
    indices: &[u32],
) -> (BufferHandle, IndexBuffer) {
    let vertex_buffer = backend.create_buffer(bytemuck::cast_slice(vertices), BufferUsage::Static);

    let index_buffer = if indices.iter().all(|&i| i <= u16::MAX as u32) {
        let short: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
        IndexBuffer::U16(backend.create_buffer(bytemuck::cast_slice(&short), BufferUsage::Static))
    } else {
        IndexBuffer::U32(backend.create_buffer(bytemuck::cast_slice(indices), BufferUsage::Static))
    };

    (vertex_buffer, index_buffer)
}

/// A mesh whose geometry lives on the GPU, ready to draw.
#[derive(Debug, Clone)]
pub struct RenderMesh {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: IndexBuffer,
    pub index_count: u32,
    pub textures: [Option<TextureHandle>; TEXTURE_SLOT_COUNT],
    pub transform: Mat4,
    pub base_color: Color,
    pub emissive_color: Color,
    pub specular_color: Color,
    pub bounds: Aabb,
    pub visible: bool,
}

impl RenderMesh {
    /// Texture to bind for a slot, skipping slots whose upload never
    /// happened.
    pub fn bound_texture(&self, slot: usize) -> Option<GpuTexture> {
        self.textures.get(slot)?.as_ref()?.gpu()
    }

    pub fn object_constants(&self) -> ObjectConstants {
        ObjectConstants::new(
            self.transform,
            self.base_color,
            self.emissive_color,
            self.specular_color,
        )
    }
}

/// Per-draw constant block (std140 compatible)
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectConstants {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    pub emissive_color: [f32; 4],
    pub specular_color: [f32; 4],
}

impl ObjectConstants {
    pub fn new(model: Mat4, base_color: Color, emissive_color: Color, specular_color: Color) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            base_color: base_color.to_array(),
            emissive_color: emissive_color.to_array(),
            specular_color: specular_color.to_array(),
        }
    }
}

/// Per-frame constant block (std140 compatible)
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameConstants {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub camera_position: [f32; 4], // xyz = position, w unused
}

impl FrameConstants {
    pub fn new(view: Mat4, projection: Mat4, camera_position: Vec3) -> Self {
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            camera_position: camera_position.extend(0.0).to_array(),
        }
    }

    pub fn from_camera(camera: &CameraParams, viewport_aspect: f32) -> Self {
        Self::new(
            camera.view_matrix(),
            camera.projection_matrix(viewport_aspect),
            camera.position,
        )
    }
}
