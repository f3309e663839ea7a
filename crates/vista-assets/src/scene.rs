//! Format-neutral scene graph produced by the file readers
//!
//! Readers fill a [`Scene`] with raw geometry, materials and the node
//! hierarchy. [`crate::postprocess`] then normalizes it (triangles only,
//! normals, tangent frames, bounds) before the importer walks it.
//!
//! UV coordinates are stored with a bottom-left origin. The flip-UVs
//! post-process step converts them to the top-left origin that the texture
//! decoder produces.

use std::path::PathBuf;
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use vista_core::{Aabb, Color};

/// Deepest node nesting accepted by readers and the importer.
pub const MAX_NODE_DEPTH: usize = 256;

/// Prefix marking a texture reference as an index into
/// [`Scene::embedded_textures`].
pub const EMBEDDED_PREFIX: char = '*';

/// Index into [`Scene::nodes`]
pub type NodeId = usize;

#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// File the scene was read from, used for error reporting
    pub source: PathBuf,
    pub nodes: Vec<SceneNode>,
    pub root: Option<NodeId>,
    pub meshes: Vec<SceneMesh>,
    pub materials: Vec<SceneMaterial>,
    pub embedded_textures: Vec<EmbeddedTexture>,
    pub cameras: Vec<SceneCamera>,
    /// Set by readers when the file carried no usable content
    pub incomplete: bool,
}

impl Scene {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Append a node and return its id. The caller links it to a parent.
    pub fn add_node(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Store an embedded image and return the reference string materials use
    /// for it (`*0`, `*1`, ...).
    pub fn add_embedded_texture(&mut self, texture: EmbeddedTexture) -> String {
        self.embedded_textures.push(texture);
        format!("{}{}", EMBEDDED_PREFIX, self.embedded_textures.len() - 1)
    }

    /// Look up an embedded texture by its `*N` reference.
    pub fn embedded_texture(&self, reference: &str) -> Option<&EmbeddedTexture> {
        let index = reference.strip_prefix(EMBEDDED_PREFIX)?.parse::<usize>().ok()?;
        self.embedded_textures.get(index)
    }

    /// The node that references a camera, if any.
    pub fn camera_node(&self, camera: usize) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.camera == Some(camera))
    }
}

/// Whether a texture reference points into the embedded table.
pub fn is_embedded_reference(reference: &str) -> bool {
    reference.starts_with(EMBEDDED_PREFIX)
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    /// Transform relative to the parent node
    pub transform: Mat4,
    /// Indices into [`Scene::meshes`]
    pub meshes: Vec<usize>,
    pub children: Vec<NodeId>,
    /// Index into [`Scene::cameras`]
    pub camera: Option<usize>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, transform: Mat4) -> Self {
        Self {
            name: name.into(),
            transform,
            meshes: Vec::new(),
            children: Vec::new(),
            camera: None,
        }
    }
}

impl Default for SceneNode {
    fn default() -> Self {
        Self::new("", Mat4::IDENTITY)
    }
}

/// How `SceneMesh::indices` groups vertices into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Topology {
    pub fn is_triangles(self) -> bool {
        matches!(
            self,
            Topology::Triangles | Topology::TriangleStrip | Topology::TriangleFan
        )
    }
}

/// Raw geometry with optional attribute streams.
///
/// Every present stream has one entry per position.
#[derive(Debug, Clone, Default)]
pub struct SceneMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub tangents: Option<Vec<Vec3>>,
    pub bitangents: Option<Vec<Vec3>>,
    /// First UV channel
    pub uvs: Option<Vec<Vec2>>,
    pub topology: Topology,
    pub indices: Vec<u32>,
    pub material_index: usize,
    /// Filled by the bounding-box post-process step
    pub bounds: Aabb,
}

impl SceneMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Triangle count, valid once the mesh is triangulated.
    pub fn triangle_count(&self) -> usize {
        match self.topology {
            Topology::Triangles => self.indices.len() / 3,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadingModel {
    /// Physically based (metallic-roughness or specular-glossiness)
    #[default]
    Pbr,
    Unlit,
}

/// Texture roles a material can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureType {
    BaseColor,
    Diffuse,
    Normals,
    Metalness,
    DiffuseRoughness,
    Emissive,
    Specular,
    AmbientOcclusion,
    Lightmap,
}

#[derive(Debug, Clone, Default)]
pub struct SceneMaterial {
    pub name: String,
    pub shading_model: ShadingModel,
    pub base_color: Option<Color>,
    pub emissive: Option<Color>,
    pub specular: Option<Color>,
    pub metallic_factor: Option<f32>,
    pub roughness_factor: Option<f32>,
    pub glossiness_factor: Option<f32>,
    /// Texture references in declaration order. A type may appear more than
    /// once; only the first entry of a type is used.
    pub textures: Vec<(TextureType, String)>,
}

impl SceneMaterial {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// First texture reference of a type.
    pub fn texture(&self, ty: TextureType) -> Option<&str> {
        self.textures
            .iter()
            .find(|(t, _)| *t == ty)
            .map(|(_, r)| r.as_str())
    }

    pub fn texture_count(&self, ty: TextureType) -> usize {
        self.textures.iter().filter(|(t, _)| *t == ty).count()
    }

    pub fn with_texture(mut self, ty: TextureType, reference: impl Into<String>) -> Self {
        self.textures.push((ty, reference.into()));
        self
    }
}

/// Compressed image bytes stored inside the scene file.
#[derive(Debug, Clone)]
pub struct EmbeddedTexture {
    /// Encoded file contents (PNG, JPEG, DDS, ...)
    pub data: Arc<[u8]>,
}

impl EmbeddedTexture {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
        }
    }
}

/// Camera description in the space of the node that references it.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneCamera {
    pub name: String,
    pub position: Vec3,
    /// Point the camera looks at
    pub look_at: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub aspect: Option<f32>,
    pub near: f32,
    pub far: Option<f32>,
}

impl Default for SceneCamera {
    fn default() -> Self {
        Self {
            name: String::new(),
            position: Vec3::ZERO,
            look_at: Vec3::NEG_Z,
            up: Vec3::Y,
            fov_y: 45f32.to_radians(),
            aspect: None,
            near: 0.1,
            far: None,
        }
    }
}
