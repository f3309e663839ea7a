use std::path::Path;

use base64::Engine;
use glam::{Mat4, Vec2, Vec3};
use gltf::camera::Projection;
use gltf::image::Source;
use gltf::mesh::Mode;
use tracing::{debug, warn};
use vista_core::Color;

use crate::error::ImportError;
use crate::scene::{
    EmbeddedTexture, Scene, SceneCamera, SceneMaterial, SceneMesh, SceneNode, ShadingModel,
    TextureType, Topology, MAX_NODE_DEPTH,
};

/// Read a glTF 2.0 file (.gltf or .glb) into a [`Scene`].
///
/// Buffers are loaded eagerly, images are not: file images become path
/// references relative to the file, embedded and data-URI images land in
/// the scene's embedded texture table still encoded.
pub fn read_scene(path: &Path) -> Result<Scene, ImportError> {
    let import_error = |e: gltf::Error| match e {
        gltf::Error::Io(e) => ImportError::Io(path.to_path_buf(), e),
        e => ImportError::Parse(path.to_path_buf(), e.to_string()),
    };

    let gltf::Gltf { document, blob } = gltf::Gltf::open(path).map_err(import_error)?;
    let buffers = gltf::import_buffers(&document, path.parent(), blob).map_err(import_error)?;

    let mut scene = Scene::new(path);

    let image_refs: Vec<Option<String>> = document
        .images()
        .map(|image| image_reference(&mut scene, &buffers, image))
        .collect();

    convert_materials(&mut scene, &document, &image_refs);

    let mut default_material = None;
    let mut mesh_map: Vec<Vec<usize>> = Vec::with_capacity(document.meshes().len());
    for mesh in document.meshes() {
        let mut primitives = Vec::new();
        for (i, primitive) in mesh.primitives().enumerate() {
            let material_index = match primitive.material().index() {
                Some(index) => index,
                None => *default_material.get_or_insert_with(|| {
                    scene.materials.push(default_gltf_material());
                    scene.materials.len() - 1
                }),
            };
            let name = match mesh.name() {
                Some(name) if i == 0 => name.to_string(),
                Some(name) => format!("{name}.{i}"),
                None => format!("mesh{}.{}", mesh.index(), i),
            };
            let converted = convert_primitive(&primitive, &buffers, name, material_index);
            primitives.push(scene.meshes.len());
            scene.meshes.push(converted);
        }
        mesh_map.push(primitives);
    }

    scene.cameras = document.cameras().map(convert_camera).collect();

    let gltf_scene = document.default_scene().or_else(|| document.scenes().next());
    if let Some(gltf_scene) = gltf_scene {
        // glTF scenes may have several roots, so hang them under one node
        let root = scene.add_node(SceneNode::new(
            gltf_scene.name().unwrap_or("root"),
            Mat4::IDENTITY,
        ));
        scene.root = Some(root);

        let mut stack: Vec<(gltf::Node<'_>, usize, usize)> =
            gltf_scene.nodes().map(|n| (n, root, 1)).collect();
        stack.reverse();
        while let Some((node, parent, depth)) = stack.pop() {
            if depth > MAX_NODE_DEPTH {
                warn!(
                    "Node '{}' is nested deeper than {}, skipping it",
                    node.name().unwrap_or_default(),
                    MAX_NODE_DEPTH
                );
                continue;
            }
            let mut converted = SceneNode::new(
                node.name().unwrap_or_default(),
                Mat4::from_cols_array_2d(&node.transform().matrix()),
            );
            if let Some(mesh) = node.mesh() {
                converted.meshes = mesh_map[mesh.index()].clone();
            }
            converted.camera = node.camera().map(|c| c.index());

            let id = scene.add_node(converted);
            scene.nodes[parent].children.push(id);

            let children: Vec<_> = node.children().collect();
            for child in children.into_iter().rev() {
                stack.push((child, id, depth + 1));
            }
        }
    }

    scene.incomplete = scene.meshes.is_empty();

    debug!(
        "glTF '{}': {} nodes, {} meshes, {} materials, {} embedded images",
        path.display(),
        scene.nodes.len(),
        scene.meshes.len(),
        scene.materials.len(),
        scene.embedded_textures.len()
    );

    Ok(scene)
}

/// Texture reference for a glTF image: a `*N` embedded reference or a path
/// relative to the scene file.
fn image_reference(
    scene: &mut Scene,
    buffers: &[gltf::buffer::Data],
    image: gltf::Image<'_>,
) -> Option<String> {
    match image.source() {
        Source::View { view, .. } => {
            let buffer = buffers.get(view.buffer().index())?;
            let bytes = buffer.get(view.offset()..view.offset() + view.length())?;
            Some(scene.add_embedded_texture(EmbeddedTexture::new(bytes)))
        }
        Source::Uri { uri, .. } => {
            if let Some(rest) = uri.strip_prefix("data:") {
                let (header, payload) = rest.split_once(',')?;
                if !header.ends_with(";base64") {
                    warn!("Image {} uses a non-base64 data URI, skipping it", image.index());
                    return None;
                }
                match base64::engine::general_purpose::STANDARD.decode(payload) {
                    Ok(bytes) => Some(scene.add_embedded_texture(EmbeddedTexture::new(bytes))),
                    Err(e) => {
                        warn!("Image {} has an invalid data URI: {}", image.index(), e);
                        None
                    }
                }
            } else {
                Some(percent_decode(uri))
            }
        }
    }
}

/// Undo `%XX` escapes in a relative URI.
fn percent_decode(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = uri.get(i + 1..i + 3).and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(b) = hex {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn default_gltf_material() -> SceneMaterial {
    SceneMaterial {
        base_color: Some(Color::WHITE),
        emissive: Some(Color::BLACK),
        metallic_factor: Some(1.0),
        roughness_factor: Some(1.0),
        ..SceneMaterial::named("default")
    }
}

fn convert_materials(scene: &mut Scene, document: &gltf::Document, image_refs: &[Option<String>]) {
    let reference = |texture: gltf::Texture<'_>| image_refs.get(texture.source().index()).cloned().flatten();

    for material in document.materials() {
        let pbr = material.pbr_metallic_roughness();
        let [er, eg, eb] = material.emissive_factor();
        let mut converted = SceneMaterial {
            name: material.name().unwrap_or_default().to_string(),
            shading_model: if material.unlit() {
                ShadingModel::Unlit
            } else {
                ShadingModel::Pbr
            },
            base_color: Some(Color::from_array(pbr.base_color_factor())),
            emissive: Some(Color::rgb(er, eg, eb)),
            metallic_factor: Some(pbr.metallic_factor()),
            roughness_factor: Some(pbr.roughness_factor()),
            ..SceneMaterial::default()
        };

        let mut add = |ty: TextureType, texture: Option<gltf::Texture<'_>>| {
            if let Some(r) = texture.and_then(reference) {
                converted.textures.push((ty, r));
            }
        };

        let base = pbr.base_color_texture().map(|i| i.texture());
        add(TextureType::BaseColor, base.clone());
        add(TextureType::Diffuse, base);
        let mr = pbr.metallic_roughness_texture().map(|i| i.texture());
        add(TextureType::Metalness, mr.clone());
        add(TextureType::DiffuseRoughness, mr);
        add(TextureType::Normals, material.normal_texture().map(|t| t.texture()));
        let occlusion = material.occlusion_texture().map(|t| t.texture());
        add(TextureType::Lightmap, occlusion.clone());
        add(TextureType::AmbientOcclusion, occlusion);
        add(TextureType::Emissive, material.emissive_texture().map(|i| i.texture()));

        if let Some(sg) = material.pbr_specular_glossiness() {
            add(TextureType::Diffuse, sg.diffuse_texture().map(|i| i.texture()));
            add(
                TextureType::Specular,
                sg.specular_glossiness_texture().map(|i| i.texture()),
            );
            if pbr.base_color_texture().is_none() {
                converted.base_color = Some(Color::from_array(sg.diffuse_factor()));
            }
            let [sr, sg_, sb] = sg.specular_factor();
            converted.specular = Some(Color::rgb(sr, sg_, sb));
            converted.glossiness_factor = Some(sg.glossiness_factor());
        }

        scene.materials.push(converted);
    }
}

fn convert_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
    name: String,
    material_index: usize,
) -> SceneMesh {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions: Vec<Vec3> = reader
        .read_positions()
        .map(|iter| iter.map(Vec3::from).collect())
        .unwrap_or_default();
    if positions.is_empty() {
        warn!("Primitive of mesh '{}' has no positions", name);
    }

    let normals: Option<Vec<Vec3>> = reader
        .read_normals()
        .map(|iter| iter.map(Vec3::from).collect());
    let normals = matching_stream(normals, positions.len(), &name, "NORMAL");

    // glTF stores handedness in w; bitangent = cross(N, T) * w
    let raw_tangents = matching_stream(
        reader.read_tangents().map(|iter| iter.collect::<Vec<[f32; 4]>>()),
        positions.len(),
        &name,
        "TANGENT",
    );
    let (tangents, bitangents) = match (raw_tangents, &normals) {
        (Some(raw), Some(normals)) => {
            let tangents: Vec<Vec3> = raw.iter().map(|t| Vec3::new(t[0], t[1], t[2])).collect();
            let bitangents = raw
                .iter()
                .zip(normals)
                .map(|(t, n)| n.cross(Vec3::new(t[0], t[1], t[2])) * t[3])
                .collect();
            (Some(tangents), Some(bitangents))
        }
        _ => (None, None),
    };

    // stored bottom-left, the flip-UVs step restores glTF's top-left origin
    let uvs: Option<Vec<Vec2>> = reader
        .read_tex_coords(0)
        .map(|tc| tc.into_f32().map(|[u, v]| Vec2::new(u, 1.0 - v)).collect());
    let uvs = matching_stream(uvs, positions.len(), &name, "TEXCOORD_0");

    let indices: Vec<u32> = reader
        .read_indices()
        .map(|idx| idx.into_u32().collect())
        .unwrap_or_else(|| (0..positions.len() as u32).collect());

    let topology = match primitive.mode() {
        Mode::Points => Topology::Points,
        Mode::Lines => Topology::Lines,
        Mode::LineLoop => Topology::LineLoop,
        Mode::LineStrip => Topology::LineStrip,
        Mode::Triangles => Topology::Triangles,
        Mode::TriangleStrip => Topology::TriangleStrip,
        Mode::TriangleFan => Topology::TriangleFan,
    };

    SceneMesh {
        name,
        positions,
        normals,
        tangents,
        bitangents,
        uvs,
        topology,
        indices,
        material_index,
        ..SceneMesh::default()
    }
}

/// Keep a vertex stream only if it has one entry per position. Accessor
/// counts are not cross-checked by the glTF reader.
fn matching_stream<T>(stream: Option<Vec<T>>, expected: usize, mesh: &str, attribute: &str) -> Option<Vec<T>> {
    match stream {
        Some(values) if values.len() != expected => {
            warn!(
                "Dropping {} of mesh '{}': {} entries for {} vertices",
                attribute,
                mesh,
                values.len(),
                expected
            );
            None
        }
        stream => stream,
    }
}

fn convert_camera(camera: gltf::Camera<'_>) -> SceneCamera {
    let mut converted = SceneCamera {
        name: camera.name().unwrap_or_default().to_string(),
        ..SceneCamera::default()
    };
    match camera.projection() {
        Projection::Perspective(p) => {
            converted.fov_y = p.yfov();
            converted.aspect = p.aspect_ratio();
            converted.near = p.znear();
            converted.far = p.zfar();
        }
        Projection::Orthographic(o) => {
            converted.near = o.znear();
            converted.far = Some(o.zfar());
        }
    }
    converted
}
