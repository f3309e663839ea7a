//! Vista Assets - Scene import for the Vista viewer
//!
//! Reads glTF 2.0 scenes into a format-neutral scene graph, normalizes it,
//! and walks it into a [`Model`]: packed and optimized meshes with resolved
//! material colors and deduplicated texture handles. Textures are decoded
//! in parallel and uploaded in one batch through a
//! [`vista_render::GpuBackend`].

pub mod dds;
mod error;
mod gltf_loader;
mod importer;
pub mod material;
mod model;
pub mod postprocess;
pub mod scene;
mod texture;
mod texture_loader;

pub use error::{ImportError, TextureError};
pub use gltf_loader::read_scene;
pub use material::{TexturePolicy, TextureSlot};
pub use model::{ImportOptions, ImportStats, Mesh, Model};
pub use scene::Scene;
pub use texture::{decode_image, decode_texture, DecodedTexture, TextureFormat};
pub use texture_loader::{
    FlushReport, TextureKey, TextureLoader, TextureLoaderConfig, TextureRequestDesc, TextureSource,
};
