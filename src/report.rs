//! Summary of an imported model as a renderer would see it

use std::fmt;

use serde::Serialize;
use vista_assets::{ImportStats, Model, TextureSlot};
use vista_core::{Aabb, CameraParams};
use vista_render::{FrameConstants, HeadlessBackend, RenderMesh};

#[derive(Debug, Serialize)]
pub struct MeshSummary {
    pub name: String,
    pub vertices: usize,
    pub triangles: usize,
    pub short_indices: bool,
    /// Slots with a loaded texture
    pub textures: Vec<usize>,
    pub base_color: [f32; 4],
}

#[derive(Debug, Serialize)]
pub struct ModelReport {
    pub meshes: Vec<MeshSummary>,
    pub bounds: Option<Aabb>,
    pub camera: CameraParams,
    pub camera_from_scene: bool,
    pub stats: ImportStats,
    pub unique_textures: usize,
    pub gpu_buffer_bytes: usize,
    pub gpu_texture_bytes: usize,
    /// Frame constants for the scene camera at the default aspect ratio
    pub view_position: [f32; 4],
}

impl ModelReport {
    /// Build the report. Call before the model's CPU buffers are released.
    pub fn new(model: &Model, render: &[RenderMesh], backend: &HeadlessBackend) -> Self {
        let meshes = model
            .meshes
            .iter()
            .zip(render)
            .map(|(mesh, gpu)| MeshSummary {
                name: mesh.name.clone(),
                vertices: mesh.vertices.len(),
                triangles: mesh.triangle_count(),
                short_indices: gpu.index_buffer.is_short(),
                textures: TextureSlot::ALL
                    .iter()
                    .map(|slot| slot.index())
                    .filter(|&slot| gpu.bound_texture(slot).is_some())
                    .collect(),
                base_color: mesh.base_color.to_array(),
            })
            .collect();

        let frame = FrameConstants::from_camera(&model.camera, model.camera.aspect);

        Self {
            meshes,
            bounds: (!model.bounds.is_empty()).then_some(model.bounds),
            camera: model.camera,
            camera_from_scene: model.camera_from_scene,
            stats: model.stats,
            unique_textures: model.unique_textures().len(),
            gpu_buffer_bytes: backend.buffer_bytes(),
            gpu_texture_bytes: backend.texture_bytes(),
            view_position: frame.camera_position,
        }
    }
}

impl fmt::Display for ModelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} meshes, {} triangles, {} -> {} vertices after welding",
            self.meshes.len(),
            self.stats.triangles,
            self.stats.vertices_in,
            self.stats.vertices_out
        )?;
        match &self.bounds {
            Some(b) => writeln!(f, "bounds: {:?} .. {:?}", b.min.to_array(), b.max.to_array())?,
            None => writeln!(f, "bounds: empty")?,
        }
        writeln!(
            f,
            "camera{}: eye {:?} target {:?} fov {:.1} deg",
            if self.camera_from_scene { " (scene)" } else { "" },
            self.camera.position.to_array(),
            self.camera.target.to_array(),
            self.camera.fov_y.to_degrees()
        )?;
        writeln!(
            f,
            "textures: {} bindings, {} unique, {} uploaded, {} failed",
            self.stats.texture_requests,
            self.unique_textures,
            self.stats.textures.uploaded,
            self.stats.textures.failures()
        )?;
        writeln!(
            f,
            "gpu: {} buffer bytes, {} texture bytes",
            self.gpu_buffer_bytes, self.gpu_texture_bytes
        )?;
        for mesh in &self.meshes {
            writeln!(
                f,
                "  {:<24} {:>8} verts {:>8} tris{} slots {:?}",
                mesh.name,
                mesh.vertices,
                mesh.triangles,
                if mesh.short_indices { " u16" } else { " u32" },
                mesh.textures
            )?;
        }
        Ok(())
    }
}
