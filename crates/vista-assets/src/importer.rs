//! Scene graph traversal producing renderable meshes

use std::path::Path;

use glam::{Mat4, Vec3};
use tracing::{debug, warn};
use vista_core::CameraParams;
use vista_render::{encode_vertices, optimize_mesh_with_stats, TextureHandle, VertexAttributes, TEXTURE_SLOT_COUNT};

use crate::material::{self, ResolvedMaterial};
use crate::model::{ImportOptions, ImportStats, Mesh};
use crate::scene::{is_embedded_reference, NodeId, Scene, SceneMaterial, SceneMesh};
use crate::texture_loader::{TextureLoader, TextureRequestDesc};

/// What one traversal produced.
pub(crate) struct ImportedScene {
    pub meshes: Vec<Mesh>,
    pub camera: Option<CameraParams>,
    pub stats: ImportStats,
}

pub(crate) struct SceneImporter<'a> {
    scene: &'a Scene,
    /// Directory file texture references are relative to
    scene_dir: &'a Path,
    options: &'a ImportOptions,
    loader: &'a mut TextureLoader,
    stats: ImportStats,
    /// World transform of every visited node
    world: Vec<Option<Mat4>>,
}

impl<'a> SceneImporter<'a> {
    pub fn new(
        scene: &'a Scene,
        scene_dir: &'a Path,
        options: &'a ImportOptions,
        loader: &'a mut TextureLoader,
    ) -> Self {
        Self {
            scene,
            scene_dir,
            options,
            loader,
            stats: ImportStats::default(),
            world: vec![None; scene.nodes.len()],
        }
    }

    /// Walk the hierarchy depth first from `root`, children in order.
    pub fn run(mut self, root: NodeId) -> ImportedScene {
        let scene = self.scene;
        let scale = Mat4::from_scale(Vec3::splat(self.options.scale));
        let mut meshes = Vec::new();
        let mut stack: Vec<(NodeId, Mat4, usize)> = vec![(root, Mat4::IDENTITY, 0)];

        while let Some((id, parent, depth)) = stack.pop() {
            let Some(node) = scene.node(id) else {
                warn!("Dangling node reference {}", id);
                continue;
            };
            if depth > self.options.max_depth {
                warn!(
                    "Node '{}' exceeds the maximum depth of {}, skipping its subtree",
                    node.name, self.options.max_depth
                );
                self.stats.nodes_skipped += 1;
                continue;
            }

            let local = if id == root {
                node.transform * scale
            } else {
                node.transform
            };
            let transform = parent * local;
            self.world[id] = Some(transform);
            self.stats.nodes_visited += 1;

            for &mesh_index in &node.meshes {
                match scene.meshes.get(mesh_index) {
                    Some(mesh) => meshes.push(self.import_mesh(mesh, transform)),
                    None => warn!("Node '{}' references missing mesh {}", node.name, mesh_index),
                }
            }

            for &child in node.children.iter().rev() {
                stack.push((child, transform, depth + 1));
            }
        }

        ImportedScene {
            camera: self.scene_camera(),
            meshes,
            stats: self.stats,
        }
    }

    fn import_mesh(&mut self, mesh: &SceneMesh, transform: Mat4) -> Mesh {
        let attributes = VertexAttributes {
            positions: &mesh.positions,
            normals: mesh.normals.as_deref(),
            tangents: mesh.tangents.as_deref(),
            bitangents: mesh.bitangents.as_deref(),
            uvs: mesh.uvs.as_deref(),
        };
        let vertices = encode_vertices(&attributes);
        let (optimized, opt_stats) = optimize_mesh_with_stats(&vertices, &mesh.indices);

        self.stats.meshes += 1;
        self.stats.vertices_in += opt_stats.vertices_in;
        self.stats.vertices_out += opt_stats.vertices_out;
        self.stats.triangles += opt_stats.triangles;

        let fallback = SceneMaterial::default();
        let scene = self.scene;
        let material = scene.materials.get(mesh.material_index).unwrap_or_else(|| {
            warn!("Mesh '{}' references missing material {}", mesh.name, mesh.material_index);
            &fallback
        });
        let resolved = material::resolve(material, self.options.texture_policy);
        if resolved.textures.is_empty() && !material.textures.is_empty() {
            debug!(
                "Material '{}' has {} textures but is not admitted by {:?}",
                material.name,
                material.textures.len(),
                self.options.texture_policy
            );
        }

        let textures = if self.options.load_textures {
            self.request_textures(&resolved)
        } else {
            Default::default()
        };

        Mesh {
            name: mesh.name.clone(),
            vertices: optimized.vertices,
            indices: optimized.indices,
            textures,
            transform,
            base_color: resolved.base_color,
            emissive_color: resolved.emissive_color,
            specular_color: resolved.specular_color,
            bounds: mesh.bounds,
            visible: true,
            material_index: mesh.material_index,
        }
    }

    fn request_textures(&mut self, resolved: &ResolvedMaterial) -> [Option<TextureHandle>; TEXTURE_SLOT_COUNT] {
        let mut slots: [Option<TextureHandle>; TEXTURE_SLOT_COUNT] = Default::default();
        for binding in &resolved.textures {
            let desc = if is_embedded_reference(&binding.reference) {
                match self.scene.embedded_texture(&binding.reference) {
                    Some(texture) => TextureRequestDesc::embedded(
                        binding.reference.as_str(),
                        texture.data.clone(),
                        binding.srgb,
                    ),
                    None => {
                        warn!("Unknown embedded texture '{}'", binding.reference);
                        continue;
                    }
                }
            } else {
                TextureRequestDesc::file(self.scene_dir.join(&binding.reference), binding.srgb)
            };
            slots[binding.slot.index()] = Some(self.loader.request_load(desc));
            self.stats.texture_requests += 1;
        }
        slots
    }

    /// Parameters of the last scene camera, placed by the node that carries
    /// it. A camera no visited node carries keeps its own parameters.
    fn scene_camera(&self) -> Option<CameraParams> {
        let index = self.scene.cameras.len().checked_sub(1)?;
        let camera = &self.scene.cameras[index];
        let world = self
            .scene
            .camera_node(index)
            .and_then(|node| self.world[node])
            .unwrap_or(Mat4::IDENTITY);

        let defaults = CameraParams::default();
        Some(CameraParams {
            position: world.transform_point3(camera.position),
            target: world.transform_point3(camera.look_at),
            up: world.transform_vector3(camera.up).normalize_or(Vec3::Y),
            fov_y: camera.fov_y,
            aspect: camera.aspect.unwrap_or(defaults.aspect),
            near: camera.near,
            far: camera.far.unwrap_or(defaults.far),
        })
    }
}
