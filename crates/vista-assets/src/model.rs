use std::collections::HashSet;
use std::path::Path;

use glam::Mat4;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vista_core::{Aabb, CameraParams, Color};
use vista_render::{upload_geometry, GpuBackend, MeshVertex, RenderMesh, TextureHandle, TEXTURE_SLOT_COUNT};

use crate::error::ImportError;
use crate::gltf_loader;
use crate::importer::SceneImporter;
use crate::material::{TexturePolicy, TextureSlot};
use crate::postprocess::{self, PostProcess};
use crate::scene::{Scene, MAX_NODE_DEPTH};
use crate::texture_loader::{FlushReport, TextureLoader};

/// Knobs for [`Model::load`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Uniform scale applied once at the root
    pub scale: f32,
    pub load_textures: bool,
    pub texture_policy: TexturePolicy,
    /// Nodes nested deeper than this are skipped
    pub max_depth: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            load_textures: false,
            texture_policy: TexturePolicy::default(),
            max_depth: MAX_NODE_DEPTH,
        }
    }
}

/// Counters gathered while importing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub nodes_visited: usize,
    pub nodes_skipped: usize,
    pub meshes: usize,
    /// Encoded vertices before welding
    pub vertices_in: usize,
    pub vertices_out: usize,
    pub triangles: usize,
    /// Texture bindings requested, before deduplication
    pub texture_requests: usize,
    pub textures: FlushReport,
}

/// One drawable piece of a model.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub textures: [Option<TextureHandle>; TEXTURE_SLOT_COUNT],
    /// Accumulated node transform
    pub transform: Mat4,
    pub base_color: Color,
    pub emissive_color: Color,
    pub specular_color: Color,
    /// Local-space bounds reported by the reader
    pub bounds: Aabb,
    pub visible: bool,
    pub material_index: usize,
}

impl Mesh {
    pub fn texture(&self, slot: TextureSlot) -> Option<&TextureHandle> {
        self.textures[slot.index()].as_ref()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// An imported scene: meshes, their bounds and the scene camera.
#[derive(Debug, Clone)]
pub struct Model {
    pub meshes: Vec<Mesh>,
    /// Union of mesh bounds, [`Aabb::EMPTY`] when there are no meshes
    pub bounds: Aabb,
    pub camera: CameraParams,
    /// Whether `camera` came from the scene rather than the defaults
    pub camera_from_scene: bool,
    pub stats: ImportStats,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            meshes: Vec::new(),
            bounds: Aabb::EMPTY,
            camera: CameraParams::default(),
            camera_from_scene: false,
            stats: ImportStats::default(),
        }
    }
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Import `filename` under `root_dir`, appending its meshes.
    ///
    /// When `options.load_textures` is set, texture requests go through
    /// `loader` and are flushed to `backend` before returning. On error the
    /// model is left as it was.
    pub fn load(
        &mut self,
        loader: &mut TextureLoader,
        backend: &mut dyn GpuBackend,
        root_dir: &Path,
        filename: impl AsRef<Path>,
        options: &ImportOptions,
    ) -> Result<(), ImportError> {
        let path = root_dir.join(filename);
        if !path.is_file() {
            return Err(ImportError::NotFound(path));
        }
        info!("Loading model '{}'", path.display());
        let scene = gltf_loader::read_scene(&path)?;
        let scene_dir = path.parent().unwrap_or(root_dir);
        self.load_scene(scene, scene_dir, loader, backend, options)
    }

    /// Import an already parsed scene. File texture references resolve
    /// against `scene_dir`.
    pub fn load_scene(
        &mut self,
        mut scene: Scene,
        scene_dir: &Path,
        loader: &mut TextureLoader,
        backend: &mut dyn GpuBackend,
        options: &ImportOptions,
    ) -> Result<(), ImportError> {
        postprocess::apply(&mut scene, &PostProcess::default());

        if scene.incomplete {
            return Err(ImportError::Incomplete(scene.source.clone()));
        }
        let Some(root) = scene.root.filter(|&r| r < scene.nodes.len()) else {
            return Err(ImportError::NoRootNode(scene.source.clone()));
        };

        let imported = SceneImporter::new(&scene, scene_dir, options, loader).run(root);

        let mut stats = imported.stats;
        if let Some(camera) = imported.camera {
            self.camera = camera;
            self.camera_from_scene = true;
        }
        self.meshes.extend(imported.meshes);
        self.bounds = self
            .meshes
            .iter()
            .fold(Aabb::EMPTY, |acc, m| acc.union(&m.bounds));

        if options.load_textures {
            stats.textures = loader.flush_pending(backend);
        }
        self.stats = stats;

        if self.is_empty() {
            warn!("Model '{}' has no meshes", scene.source.display());
        } else {
            info!(
                "Loaded '{}': {} meshes, {} triangles, {} -> {} vertices",
                scene.source.display(),
                stats.meshes,
                stats.triangles,
                stats.vertices_in,
                stats.vertices_out
            );
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Distinct texture handles referenced by any mesh.
    pub fn unique_textures(&self) -> HashSet<TextureHandle> {
        self.meshes
            .iter()
            .flat_map(|m| m.textures.iter().flatten())
            .cloned()
            .collect()
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }

    /// Create GPU buffers for every mesh. Call before
    /// [`Model::destroy_cpu_side_buffers`].
    pub fn upload(&self, backend: &mut dyn GpuBackend) -> Vec<RenderMesh> {
        self.meshes
            .iter()
            .map(|mesh| {
                if mesh.vertices.is_empty() {
                    warn!("Uploading mesh '{}' without CPU geometry", mesh.name);
                }
                let (vertex_buffer, index_buffer) = upload_geometry(backend, &mesh.vertices, &mesh.indices);
                RenderMesh {
                    vertex_buffer,
                    index_buffer,
                    index_count: mesh.indices.len() as u32,
                    textures: mesh.textures.clone(),
                    transform: mesh.transform,
                    base_color: mesh.base_color,
                    emissive_color: mesh.emissive_color,
                    specular_color: mesh.specular_color,
                    bounds: mesh.bounds,
                    visible: mesh.visible,
                }
            })
            .collect()
    }

    /// Drop vertex and index data once it lives on the GPU.
    pub fn destroy_cpu_side_buffers(&mut self) {
        for mesh in &mut self.meshes {
            mesh.vertices = Vec::new();
            mesh.indices = Vec::new();
        }
    }

    /// Delete every uploaded texture exactly once and clear the model.
    pub fn destroy(&mut self, backend: &mut dyn GpuBackend) {
        let mut deleted = 0;
        for handle in self.unique_textures() {
            if let Some(texture) = handle.take() {
                backend.delete_texture(texture);
                deleted += 1;
            }
        }
        if deleted > 0 {
            info!("Deleted {} textures", deleted);
        }
        self.destroy_cpu_side_buffers();
        self.meshes.clear();
        self.bounds = Aabb::EMPTY;
    }
}
