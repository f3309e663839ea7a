use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use glam::Vec2;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::json;
use tempfile::tempdir;
use vista_assets::{ImportError, ImportOptions, Model, TextureLoader, TextureSlot};
use vista_core::Color;
use vista_render::HeadlessBackend;

/// Positions, UVs, normals and indices of one triangle facing +Z.
fn triangle_bin() -> Vec<u8> {
    let mut bin = Vec::new();
    let floats = [
        [0.0f32, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
    ]
    .into_iter()
    .flatten()
    .chain([0.0f32, 0.0, 1.0, 0.0, 0.0, 1.0])
    .chain([[0.0f32, 0.0, 1.0]; 3].into_iter().flatten());
    for c in floats {
        bin.extend_from_slice(&c.to_le_bytes());
    }
    for i in [0u16, 1, 2] {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    bin
}

/// Accessors over [`triangle_bin`]: 0 positions, 1 UVs, 2 indices, 3 normals.
/// `uv_count` and `normal_count` let a test shorten those streams.
fn triangle_accessors(uv_count: usize, normal_count: usize) -> serde_json::Value {
    json!({
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 24 },
            { "buffer": 0, "byteOffset": 96, "byteLength": 6, "target": 34963 },
            { "buffer": 0, "byteOffset": 60, "byteLength": 36 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5126, "count": uv_count, "type": "VEC2" },
            { "bufferView": 2, "componentType": 5123, "count": 3, "type": "SCALAR" },
            { "bufferView": 3, "componentType": 5126, "count": normal_count, "type": "VEC3" }
        ]
    })
}

/// Write `document` as scene.gltf next to scene.bin, filling in the buffer
/// and the triangle accessors.
fn write_document(dir: &Path, mut document: serde_json::Value, uv_count: usize, normal_count: usize) -> Result<()> {
    let bin = triangle_bin();
    std::fs::write(dir.join("scene.bin"), &bin)?;

    document["asset"] = json!({ "version": "2.0" });
    document["buffers"] = json!([{ "byteLength": bin.len(), "uri": "scene.bin" }]);
    let accessors = triangle_accessors(uv_count, normal_count);
    document["bufferViews"] = accessors["bufferViews"].clone();
    document["accessors"] = accessors["accessors"].clone();
    std::fs::write(dir.join("scene.gltf"), serde_json::to_vec_pretty(&document)?)?;
    Ok(())
}

fn write_png(dir: &Path, name: &str, pixel: [u8; 4]) -> Result<()> {
    let img = RgbaImage::from_pixel(4, 4, Rgba(pixel));
    DynamicImage::ImageRgba8(img).save_with_format(dir.join(name), ImageFormat::Png)?;
    Ok(())
}

/// Three meshes: two share a base-color texture, the third has no UVs.
fn write_scene(dir: &Path, with_texture: bool) -> Result<()> {
    let textured = json!({
        "attributes": { "POSITION": 0, "TEXCOORD_0": 1 },
        "indices": 2,
        "material": 0
    });
    let document = json!({
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [
            { "name": "root", "children": [1, 2, 3] },
            { "mesh": 0 },
            { "mesh": 1, "translation": [4.0, 0.0, 0.0] },
            { "mesh": 2 }
        ],
        "meshes": [
            { "name": "textured", "primitives": [textured.clone()] },
            { "name": "also_textured", "primitives": [textured] },
            { "name": "bare", "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 2, "material": 1 }] }
        ],
        "materials": [
            { "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 }, "metallicFactor": 1.0 } },
            { "pbrMetallicRoughness": { "baseColorFactor": [0.2, 0.4, 0.6, 1.0], "metallicFactor": 0.0 } }
        ],
        "textures": [{ "source": 0 }],
        "images": [{ "uri": "albedo.png" }]
    });
    write_document(dir, document, 3, 3)?;

    if with_texture {
        write_png(dir, "albedo.png", [200, 100, 50, 255])?;
    }
    Ok(())
}

/// Two meshes sharing one material with two distinct images: albedo.png as
/// base color and emissive, normal.png as the normal map.
fn write_two_texture_scene(dir: &Path) -> Result<()> {
    let primitive = json!({
        "attributes": { "POSITION": 0, "NORMAL": 3, "TEXCOORD_0": 1 },
        "indices": 2,
        "material": 0
    });
    let document = json!({
        "scene": 0,
        "scenes": [{ "nodes": [0, 1] }],
        "nodes": [{ "mesh": 0 }, { "mesh": 1 }],
        "meshes": [
            { "name": "left", "primitives": [primitive.clone()] },
            { "name": "right", "primitives": [primitive] }
        ],
        "materials": [{
            "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 }, "metallicFactor": 1.0 },
            "emissiveTexture": { "index": 0 },
            "normalTexture": { "index": 1 }
        }],
        "textures": [{ "source": 0 }, { "source": 1 }],
        "images": [{ "uri": "albedo.png" }, { "uri": "normal.png" }]
    });
    write_document(dir, document, 3, 3)?;
    write_png(dir, "albedo.png", [200, 100, 50, 255])?;
    write_png(dir, "normal.png", [128, 128, 255, 255])?;
    Ok(())
}

/// One mesh whose UV or normal accessor is shorter than its positions.
fn write_short_stream_scene(dir: &Path, uv_count: usize, normal_count: usize) -> Result<()> {
    let document = json!({
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "name": "short",
            "primitives": [{ "attributes": { "POSITION": 0, "NORMAL": 3, "TEXCOORD_0": 1 }, "indices": 2 }]
        }]
    });
    write_document(dir, document, uv_count, normal_count)
}

fn textured_options() -> ImportOptions {
    ImportOptions {
        load_textures: true,
        ..ImportOptions::default()
    }
}

#[test]
fn shared_base_color_is_decoded_once() -> Result<()> {
    let dir = tempdir()?;
    write_scene(dir.path(), true)?;

    let mut model = Model::new();
    let mut loader = TextureLoader::new();
    let mut backend = HeadlessBackend::new();
    model.load(&mut loader, &mut backend, dir.path(), "scene.gltf", &textured_options())?;

    let names: Vec<_> = model.meshes.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["textured", "also_textured", "bare"]);

    let a = model.meshes[0].texture(TextureSlot::BaseColor).expect("first handle");
    let b = model.meshes[1].texture(TextureSlot::BaseColor).expect("second handle");
    assert_eq!(a, b);
    assert!(a.is_loaded());
    assert_eq!(backend.textures.len(), 1);
    assert!(backend.textures[0].srgb);
    assert_eq!(backend.textures[0].channels, 4);
    assert_eq!(model.stats.texture_requests, 2);
    assert_eq!(model.stats.textures.uploaded, 1);
    assert_eq!(model.unique_textures().len(), 1);
    assert!(loader.is_idle());
    Ok(())
}

#[test]
fn mesh_without_uvs_imports_with_zero_uvs() -> Result<()> {
    let dir = tempdir()?;
    write_scene(dir.path(), true)?;

    let mut model = Model::new();
    model.load(
        &mut TextureLoader::new(),
        &mut HeadlessBackend::new(),
        dir.path(),
        "scene.gltf",
        &ImportOptions::default(),
    )?;

    let bare = &model.meshes[2];
    assert_eq!(bare.vertices.len(), 3);
    assert_eq!(bare.indices.len(), 3);
    assert!(bare.vertices.iter().all(|v| v.uv() == Vec2::ZERO));
    assert!(bare.vertices.iter().all(|v| v.tangent == [0; 4]));
    // generated normal faces +Z
    assert!(bare.vertices.iter().all(|v| v.normal().z > 0.99));
    assert_eq!(bare.base_color, Color::rgba(0.2, 0.4, 0.6, 1.0));
    assert!(bare.textures.iter().all(Option::is_none));

    // textured meshes keep their UVs in the file's top-left convention
    let uvs: Vec<Vec2> = model.meshes[0].vertices.iter().map(|v| v.uv()).collect();
    assert!(uvs.contains(&Vec2::new(1.0, 0.0)));
    assert!(uvs.contains(&Vec2::new(0.0, 1.0)));
    Ok(())
}

#[test]
fn node_transforms_and_bounds() -> Result<()> {
    let dir = tempdir()?;
    write_scene(dir.path(), false)?;

    let mut model = Model::new();
    model.load(
        &mut TextureLoader::new(),
        &mut HeadlessBackend::new(),
        dir.path(),
        "scene.gltf",
        &ImportOptions::default(),
    )?;

    assert_eq!(model.meshes[1].transform.w_axis.x, 4.0);
    assert_eq!(model.bounds.max.x, 1.0);
    assert_eq!(model.bounds.min.y, 0.0);
    assert_eq!(model.stats.nodes_visited, 5);
    assert!(!model.camera_from_scene);
    Ok(())
}

#[test]
fn missing_scene_file_fails_and_leaves_model_empty() {
    let dir = tempdir().unwrap();
    let mut model = Model::new();
    let result = model.load(
        &mut TextureLoader::new(),
        &mut HeadlessBackend::new(),
        dir.path(),
        "nope.gltf",
        &ImportOptions::default(),
    );
    assert!(matches!(result, Err(ImportError::NotFound(_))));
    assert!(model.is_empty());
    assert!(model.bounds.is_empty());
}

#[test]
fn malformed_scene_is_a_parse_error() -> Result<()> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("broken.gltf"), b"{ not json")?;
    let mut model = Model::new();
    let result = model.load(
        &mut TextureLoader::new(),
        &mut HeadlessBackend::new(),
        dir.path(),
        "broken.gltf",
        &ImportOptions::default(),
    );
    assert!(matches!(result, Err(ImportError::Parse(..))));
    assert!(model.is_empty());
    Ok(())
}

#[test]
fn missing_texture_leaves_its_slot_unloaded() -> Result<()> {
    let dir = tempdir()?;
    write_scene(dir.path(), false)?;

    let mut model = Model::new();
    let mut backend = HeadlessBackend::new();
    model.load(&mut TextureLoader::new(), &mut backend, dir.path(), "scene.gltf", &textured_options())?;

    let handle = model.meshes[0].texture(TextureSlot::BaseColor).expect("handle");
    assert!(!handle.is_loaded());
    assert_eq!(model.stats.textures.read_failures, 1);
    assert!(backend.textures.is_empty());

    let render = model.upload(&mut backend);
    assert_eq!(render[0].bound_texture(TextureSlot::BaseColor.index()), None);
    Ok(())
}

#[test]
fn destroy_deletes_each_distinct_texture_once() -> Result<()> {
    let dir = tempdir()?;
    write_scene(dir.path(), true)?;

    let mut model = Model::new();
    let mut backend = HeadlessBackend::new();
    model.load(&mut TextureLoader::new(), &mut backend, dir.path(), "scene.gltf", &textured_options())?;
    let render = model.upload(&mut backend);
    assert_eq!(render.len(), 3);
    assert!(render.iter().all(|m| m.index_buffer.is_short()));

    model.destroy_cpu_side_buffers();
    assert_eq!(model.meshes.len(), 3);

    model.destroy(&mut backend);
    assert_eq!(backend.deleted_textures.len(), 1);
    assert_eq!(backend.live_textures(), 0);
    assert!(model.is_empty());
    // render descriptors see the deletion through their shared handles
    assert_eq!(render[0].bound_texture(0), None);
    Ok(())
}

#[test]
fn destroy_deletes_every_distinct_texture_across_slots_and_meshes() -> Result<()> {
    let dir = tempdir()?;
    write_two_texture_scene(dir.path())?;

    let mut model = Model::new();
    let mut backend = HeadlessBackend::new();
    model.load(&mut TextureLoader::new(), &mut backend, dir.path(), "scene.gltf", &textured_options())?;

    // 3 slots in each of 2 meshes, backed by 2 textures
    assert_eq!(model.stats.texture_requests, 6);
    for mesh in &model.meshes {
        let base = mesh.texture(TextureSlot::BaseColor).expect("base color");
        let emissive = mesh.texture(TextureSlot::Emissive).expect("emissive");
        let normal = mesh.texture(TextureSlot::Normal).expect("normal");
        assert_eq!(base, emissive);
        assert_ne!(base, normal);
    }
    assert_eq!(model.unique_textures().len(), 2);
    assert_eq!(backend.textures.len(), 2);

    let created: BTreeSet<u32> = backend.textures.iter().map(|t| t.texture.id).collect();
    model.destroy(&mut backend);

    assert_eq!(backend.deleted_textures.len(), 2);
    let deleted: BTreeSet<u32> = backend.deleted_textures.iter().map(|t| t.id).collect();
    assert_eq!(deleted, created);
    assert_eq!(backend.live_textures(), 0);

    // a second destroy has nothing left to delete
    model.destroy(&mut backend);
    assert_eq!(backend.deleted_textures.len(), 2);
    Ok(())
}

#[test]
fn short_uv_accessor_is_dropped_not_indexed() -> Result<()> {
    let dir = tempdir()?;
    write_short_stream_scene(dir.path(), 1, 3)?;

    let mut model = Model::new();
    model.load(
        &mut TextureLoader::new(),
        &mut HeadlessBackend::new(),
        dir.path(),
        "scene.gltf",
        &ImportOptions::default(),
    )?;

    let mesh = &model.meshes[0];
    assert_eq!(mesh.vertices.len(), 3);
    assert!(mesh.vertices.iter().all(|v| v.uv() == Vec2::ZERO));
    // no UVs means no tangent frame
    assert!(mesh.vertices.iter().all(|v| v.tangent == [0; 4]));
    assert!(mesh.vertices.iter().all(|v| v.normal().z > 0.99));
    Ok(())
}

#[test]
fn short_normal_accessor_falls_back_to_generated_normals() -> Result<()> {
    let dir = tempdir()?;
    write_short_stream_scene(dir.path(), 3, 1)?;

    let mut model = Model::new();
    model.load(
        &mut TextureLoader::new(),
        &mut HeadlessBackend::new(),
        dir.path(),
        "scene.gltf",
        &ImportOptions::default(),
    )?;

    let mesh = &model.meshes[0];
    assert_eq!(mesh.vertices.len(), 3);
    assert!(mesh.vertices.iter().all(|v| v.normal().z > 0.99));
    assert!(mesh.vertices.iter().any(|v| v.uv() != Vec2::ZERO));
    Ok(())
}
