//! The GPU resource-creation seam
//!
//! The importer and texture loader never talk to a graphics API directly.
//! They go through [`GpuBackend`], which a renderer implements on top of its
//! device. All calls happen on the thread that owns the graphics context.

use tracing::debug;

/// Opaque GPU buffer name returned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// A created GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuTexture {
    pub id: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferUsage {
    /// Written once at creation
    #[default]
    Static,
    /// Updated every frame (uniforms, light lists)
    Dynamic,
}

/// Block-compressed pixel data description, using GL internal format enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedFormat {
    pub internal_format: u32,
    /// Bytes per 4x4 block
    pub block_bytes: u32,
    /// Number of mip levels stored back to back in `pixels`
    pub mip_levels: u32,
}

/// Decoded pixels ready for upload.
#[derive(Debug, Clone, Copy)]
pub struct TextureUpload<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// 1..=4 for uncompressed data, ignored when `compressed` is set
    pub channels: u8,
    pub srgb: bool,
    pub compressed: Option<CompressedFormat>,
    /// The caller intends to make this texture resident for bindless access
    pub bindless: bool,
}

/// Resource-creation capabilities the asset pipeline needs from a renderer.
pub trait GpuBackend {
    fn create_buffer(&mut self, bytes: &[u8], usage: BufferUsage) -> BufferHandle;

    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> GpuTexture;

    fn delete_texture(&mut self, texture: GpuTexture);
}

/// What a [`HeadlessBackend`] saw for one created texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRecord {
    pub texture: GpuTexture,
    pub channels: u8,
    pub srgb: bool,
    pub compressed: Option<CompressedFormat>,
    pub bindless: bool,
    pub byte_len: usize,
}

/// Backend that allocates names without a GPU and records every call.
///
/// Used by the command line runner to exercise the full pipeline, and by
/// tests to count uploads and deletions.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u32,
    /// Byte size of each created buffer, indexed by `BufferHandle.0 - 1`
    pub buffers: Vec<(BufferUsage, usize)>,
    pub textures: Vec<TextureRecord>,
    pub deleted_textures: Vec<GpuTexture>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Textures created and not yet deleted
    pub fn live_textures(&self) -> usize {
        self.textures.len() - self.deleted_textures.len()
    }

    pub fn buffer_bytes(&self) -> usize {
        self.buffers.iter().map(|(_, len)| len).sum()
    }

    pub fn texture_bytes(&self) -> usize {
        self.textures.iter().map(|t| t.byte_len).sum()
    }
}

impl GpuBackend for HeadlessBackend {
    fn create_buffer(&mut self, bytes: &[u8], usage: BufferUsage) -> BufferHandle {
        let id = self.allocate();
        self.buffers.push((usage, bytes.len()));
        BufferHandle(id)
    }

    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> GpuTexture {
        let texture = GpuTexture {
            id: self.allocate(),
            width: upload.width,
            height: upload.height,
        };
        debug!(
            "Headless texture {} ({}x{}, {} bytes)",
            texture.id,
            upload.width,
            upload.height,
            upload.pixels.len()
        );
        self.textures.push(TextureRecord {
            texture,
            channels: upload.channels,
            srgb: upload.srgb,
            compressed: upload.compressed,
            bindless: upload.bindless,
            byte_len: upload.pixels.len(),
        });
        texture
    }

    fn delete_texture(&mut self, texture: GpuTexture) {
        self.deleted_textures.push(texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_names_are_unique() {
        let mut backend = HeadlessBackend::new();
        let a = backend.create_buffer(&[0; 16], BufferUsage::Static);
        let t = backend.create_texture(&TextureUpload {
            pixels: &[255; 4],
            width: 1,
            height: 1,
            channels: 4,
            srgb: true,
            compressed: None,
            bindless: false,
        });
        let b = backend.create_buffer(&[0; 8], BufferUsage::Dynamic);
        assert_ne!(a, b);
        assert_ne!(a.0, t.id);
        assert_eq!(backend.buffer_bytes(), 24);
        assert_eq!(backend.texture_bytes(), 4);
        assert_eq!(backend.live_textures(), 1);

        backend.delete_texture(t);
        assert_eq!(backend.live_textures(), 0);
    }
}
