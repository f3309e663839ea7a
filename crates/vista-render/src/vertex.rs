//! Packed vertex format shared by every imported mesh
//!
//! Positions and texture coordinates are stored as IEEE half floats, normals
//! and tangents as 8-bit signed-normalized values biased into `0..=255`.
//! The tangent is pre-multiplied by the frame handedness, so the shader gets
//! the bitangent back as `cross(N, T)` and the authored tangent as `T * w`.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};
use half::f16;

/// GPU vertex record. Every mesh of a model uses this exact layout so the
/// vertex shader can pull vertices from a storage buffer with a fixed stride.
#[repr(C, align(8))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
pub struct MeshVertex {
    /// xyz + w(=1.0), half floats
    pub position: [u16; 4],
    /// xyz + w(=1.0), snorm8 biased
    pub normal: [u8; 4],
    /// handedness-corrected xyz + handedness sign in w, snorm8 biased
    pub tangent: [u8; 4],
    /// half floats
    pub uv: [u16; 2],
    _pad: [u16; 2],
}

const _: () = assert!(std::mem::size_of::<MeshVertex>() == MeshVertex::STRIDE as usize);
const _: () = assert!(std::mem::align_of::<MeshVertex>() == 8);

/// Attribute formats used in [`MeshVertex::LAYOUT`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexFormat {
    Float16x4,
    Float16x2,
    /// Four bytes read as unorm and remapped to `[-1, 1]` in the shader
    Snorm8x4Biased,
}

/// One attribute of the packed vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub offset: u32,
    pub format: VertexFormat,
}

impl MeshVertex {
    pub const STRIDE: u32 = 24;

    /// Attribute table for pipelines that use fixed-function vertex input
    /// instead of vertex pulling.
    pub const LAYOUT: [VertexAttribute; 4] = [
        VertexAttribute {
            name: "position",
            offset: 0,
            format: VertexFormat::Float16x4,
        },
        VertexAttribute {
            name: "normal",
            offset: 8,
            format: VertexFormat::Snorm8x4Biased,
        },
        VertexAttribute {
            name: "tangent",
            offset: 12,
            format: VertexFormat::Snorm8x4Biased,
        },
        VertexAttribute {
            name: "uv",
            offset: 16,
            format: VertexFormat::Float16x2,
        },
    ];

    /// Build a vertex from already-unpacked attributes. `tangent.w` is the
    /// handedness sign.
    pub fn new(position: Vec3, normal: Vec3, tangent: Vec4, uv: Vec2) -> Self {
        Self {
            position: encode_position(position),
            normal: encode_normal(normal),
            tangent: [
                encode_snorm8(tangent.x),
                encode_snorm8(tangent.y),
                encode_snorm8(tangent.z),
                encode_snorm8(tangent.w),
            ],
            uv: encode_uv(uv),
            _pad: [0; 2],
        }
    }

    pub fn position(&self) -> Vec4 {
        Vec4::new(
            decode_half(self.position[0]),
            decode_half(self.position[1]),
            decode_half(self.position[2]),
            decode_half(self.position[3]),
        )
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::new(
            decode_snorm8(self.normal[0]),
            decode_snorm8(self.normal[1]),
            decode_snorm8(self.normal[2]),
        )
    }

    /// Tangent xyz with the handedness sign in w
    pub fn tangent(&self) -> Vec4 {
        Vec4::new(
            decode_snorm8(self.tangent[0]),
            decode_snorm8(self.tangent[1]),
            decode_snorm8(self.tangent[2]),
            decode_snorm8(self.tangent[3]),
        )
    }

    pub fn uv(&self) -> Vec2 {
        Vec2::new(decode_half(self.uv[0]), decode_half(self.uv[1]))
    }
}

/// Quantize a float to IEEE 754 binary16 bits.
pub fn encode_half(v: f32) -> u16 {
    f16::from_f32(v).to_bits()
}

pub fn decode_half(bits: u16) -> f32 {
    f16::from_bits(bits).to_f32()
}

/// Map `[-1, 1]` onto a byte with `v * 127 + 127.5`, truncated.
///
/// Truncates rather than rounds. Meshes encoded by the existing tooling use
/// this exact byte mapping.
pub fn encode_snorm8(v: f32) -> u8 {
    (v.clamp(-1.0, 1.0) * 127.0 + 127.5) as u8
}

/// Inverse of [`encode_snorm8`], accurate to within 1/127.
pub fn decode_snorm8(b: u8) -> f32 {
    ((b as f32 - 127.0) / 127.0).clamp(-1.0, 1.0)
}

/// `-1` for a mirrored tangent frame, `+1` otherwise.
pub fn tangent_handedness(normal: Vec3, tangent: Vec3, bitangent: Vec3) -> f32 {
    if normal.cross(tangent).dot(bitangent) < 0.0 {
        -1.0
    } else {
        1.0
    }
}

fn encode_position(p: Vec3) -> [u16; 4] {
    [
        encode_half(p.x),
        encode_half(p.y),
        encode_half(p.z),
        encode_half(1.0),
    ]
}

fn encode_normal(n: Vec3) -> [u8; 4] {
    [
        encode_snorm8(n.x),
        encode_snorm8(n.y),
        encode_snorm8(n.z),
        encode_snorm8(1.0),
    ]
}

/// The tangent is flipped by the handedness before packing, and the sign is
/// stored in w with the same encoding.
fn encode_tangent(normal: Vec3, tangent: Vec3, bitangent: Vec3) -> [u8; 4] {
    let handedness = tangent_handedness(normal, tangent, bitangent);
    let t = tangent * handedness;
    [
        encode_snorm8(t.x),
        encode_snorm8(t.y),
        encode_snorm8(t.z),
        encode_snorm8(handedness),
    ]
}

fn encode_uv(uv: Vec2) -> [u16; 2] {
    [encode_half(uv.x), encode_half(uv.y)]
}

/// Unpacked per-vertex attribute streams of one mesh. `positions` defines the
/// vertex count; any missing stream leaves its fields zeroed.
#[derive(Clone, Copy, Debug, Default)]
pub struct VertexAttributes<'a> {
    pub positions: &'a [Vec3],
    pub normals: Option<&'a [Vec3]>,
    pub tangents: Option<&'a [Vec3]>,
    pub bitangents: Option<&'a [Vec3]>,
    pub uvs: Option<&'a [Vec2]>,
}

/// Pack attribute streams into zero-initialised [`MeshVertex`] records.
///
/// Tangents are written only when normals, tangents and bitangents are all
/// present, since the handedness needs the full frame.
pub fn encode_vertices(attributes: &VertexAttributes<'_>) -> Vec<MeshVertex> {
    let mut vertices = vec![MeshVertex::zeroed(); attributes.positions.len()];

    for (v, p) in vertices.iter_mut().zip(attributes.positions) {
        v.position = encode_position(*p);
    }

    if let Some(normals) = attributes.normals {
        for (v, n) in vertices.iter_mut().zip(normals) {
            v.normal = encode_normal(*n);
        }
    }

    if let (Some(normals), Some(tangents), Some(bitangents)) =
        (attributes.normals, attributes.tangents, attributes.bitangents)
    {
        let frames = normals.iter().zip(tangents).zip(bitangents);
        for (v, ((n, t), b)) in vertices.iter_mut().zip(frames) {
            v.tangent = encode_tangent(*n, *t, *b);
        }
    }

    if let Some(uvs) = attributes.uvs {
        for (v, uv) in vertices.iter_mut().zip(uvs) {
            v.uv = encode_uv(*uv);
        }
    }

    vertices
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn record_is_24_bytes() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 24);
        assert_eq!(std::mem::align_of::<MeshVertex>(), 8);
        assert_eq!(MeshVertex::LAYOUT[3].offset, 16);
    }

    #[test]
    fn half_roundtrip_within_epsilon() {
        for &v in &[0.0f32, 1.0, -1.0, 0.333, 12.75, -250.5, 1024.0, 0.0001] {
            let back = decode_half(encode_half(v));
            let tolerance = v.abs() * f32::from(f16::EPSILON) + f32::from(f16::MIN_POSITIVE);
            assert!((back - v).abs() <= tolerance, "{v} -> {back}");
        }
    }

    #[test]
    fn snorm8_roundtrip_within_one_step() {
        let mut v = -1.0f32;
        while v <= 1.0 {
            let back = decode_snorm8(encode_snorm8(v));
            assert!((back - v).abs() <= 1.0 / 127.0, "{v} -> {back}");
            v += 0.01;
        }
    }

    #[test]
    fn snorm8_endpoints() {
        assert_eq!(encode_snorm8(-1.0), 0);
        // truncated, so the midpoint lands on 127 rather than 128
        assert_eq!(encode_snorm8(0.0), 127);
        assert_eq!(encode_snorm8(1.0), 254);
        assert_eq!(encode_snorm8(7.0), 254);
    }

    #[test]
    fn handedness_sign() {
        assert_eq!(tangent_handedness(Vec3::Z, Vec3::X, Vec3::Y), 1.0);
        assert_eq!(tangent_handedness(Vec3::Z, Vec3::X, -Vec3::Y), -1.0);
    }

    #[test]
    fn mirrored_tangent_is_flipped_and_signed() {
        let positions = [Vec3::ZERO];
        let normals = [Vec3::Z];
        let tangents = [Vec3::X];
        let bitangents = [-Vec3::Y];
        let v = encode_vertices(&VertexAttributes {
            positions: &positions,
            normals: Some(&normals),
            tangents: Some(&tangents),
            bitangents: Some(&bitangents),
            uvs: None,
        })[0];

        let t = v.tangent();
        assert_abs_diff_eq!(t.x, -1.0, epsilon = 1.0 / 127.0);
        assert_abs_diff_eq!(t.w, -1.0, epsilon = 1.0 / 127.0);

        let bitangent = v.normal().cross(t.truncate());
        assert_abs_diff_eq!(bitangent.y, -1.0, epsilon = 0.02);
        let authored = t.truncate() * t.w;
        assert_abs_diff_eq!(authored.x, 1.0, epsilon = 0.02);
    }

    #[test]
    fn missing_streams_stay_zero() {
        let positions = [Vec3::new(1.0, 2.0, 3.0), Vec3::new(-4.0, 0.5, 0.0)];
        let vertices = encode_vertices(&VertexAttributes {
            positions: &positions,
            ..Default::default()
        });

        assert_eq!(vertices.len(), 2);
        for v in &vertices {
            assert_eq!(v.normal, [0; 4]);
            assert_eq!(v.tangent, [0; 4]);
            assert_eq!(v.uv, [0; 2]);
            assert_eq!(v.position()[3], 1.0);
        }
        assert_eq!(vertices[1].position().truncate(), Vec3::new(-4.0, 0.5, 0.0));
    }

    #[test]
    fn tangents_need_normals() {
        let positions = [Vec3::ZERO];
        let tangents = [Vec3::X];
        let bitangents = [Vec3::Y];
        let v = encode_vertices(&VertexAttributes {
            positions: &positions,
            normals: None,
            tangents: Some(&tangents),
            bitangents: Some(&bitangents),
            uvs: None,
        })[0];
        assert_eq!(v.tangent, [0; 4]);
    }
}
