//! Material to texture-slot resolution

use serde::{Deserialize, Serialize};
use vista_core::Color;
use vista_render::TEXTURE_SLOT_COUNT;

use crate::scene::{SceneMaterial, ShadingModel, TextureType};

/// Fixed texture slots a mesh binds, numbered as the shaders expect them.
///
/// Several names alias one slot: the specular-glossiness and legacy workflows
/// reuse the metallic-roughness slot layout. A material uses a single
/// workflow, so aliased roles never compete for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    BaseColor = 0,
    Normal = 1,
    OcclusionMetallicRoughness = 2,
    Emissive = 3,
    Metalness = 4,
    AmbientOcclusion = 5,
}

impl TextureSlot {
    pub const DIFFUSE: Self = Self::BaseColor;
    pub const NORMAL_CAMERA: Self = Self::Normal;
    pub const SHININESS: Self = Self::OcclusionMetallicRoughness;
    pub const DIFFUSE_ROUGHNESS: Self = Self::OcclusionMetallicRoughness;
    pub const SPECULAR: Self = Self::Metalness;
    pub const LIGHTMAP: Self = Self::AmbientOcclusion;

    pub const ALL: [Self; TEXTURE_SLOT_COUNT] = [
        Self::BaseColor,
        Self::Normal,
        Self::OcclusionMetallicRoughness,
        Self::Emissive,
        Self::Metalness,
        Self::AmbientOcclusion,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Color data is stored gamma encoded, everything else is linear.
    /// Slot 4 is only ever populated with specular color.
    pub fn is_srgb(self) -> bool {
        matches!(self, Self::BaseColor | Self::Emissive | Self::Metalness)
    }
}

/// Which materials get their textures loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TexturePolicy {
    /// PBR materials that declare a positive metallic factor
    #[default]
    MetallicFactorGate,
    /// Any PBR material
    AnyPbr,
    /// Every material, including legacy and unlit ones
    Always,
}

impl TexturePolicy {
    pub fn admits(self, material: &SceneMaterial) -> bool {
        let pbr = material.shading_model == ShadingModel::Pbr;
        match self {
            TexturePolicy::MetallicFactorGate => {
                pbr && material.metallic_factor.is_some_and(|m| m > 0.0)
            }
            TexturePolicy::AnyPbr => pbr,
            TexturePolicy::Always => true,
        }
    }
}

/// One texture a mesh wants bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    pub slot: TextureSlot,
    /// File path relative to the scene directory, or a `*N` embedded reference
    pub reference: String,
    pub srgb: bool,
}

/// Material colors and texture bindings for one mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMaterial {
    pub base_color: Color,
    pub emissive_color: Color,
    pub specular_color: Color,
    pub textures: Vec<TextureBinding>,
}

/// Roles tried in order for each slot.
const SLOT_SOURCES: [(TextureSlot, &[TextureType]); 5] = [
    (
        TextureSlot::BaseColor,
        &[TextureType::BaseColor, TextureType::Diffuse],
    ),
    (
        TextureSlot::Normal,
        &[TextureType::Normals],
    ),
    (
        TextureSlot::OcclusionMetallicRoughness,
        &[
            TextureType::Metalness,
            TextureType::DiffuseRoughness,
        ],
    ),
    (
        TextureSlot::Emissive,
        &[TextureType::Emissive],
    ),
    (TextureSlot::SPECULAR, &[TextureType::Specular]),
];

/// Resolve colors and, when the policy admits the material, texture bindings.
///
/// Missing colors fall back to white base, black emissive and black
/// specular. Ambient occlusion gets its own slot only when it is not packed
/// into the metallic-roughness texture.
pub fn resolve(material: &SceneMaterial, policy: TexturePolicy) -> ResolvedMaterial {
    let mut resolved = ResolvedMaterial {
        base_color: material.base_color.unwrap_or(Color::WHITE),
        emissive_color: material.emissive.unwrap_or(Color::BLACK),
        specular_color: material.specular.unwrap_or(Color::BLACK),
        textures: Vec::new(),
    };

    if !policy.admits(material) {
        return resolved;
    }

    for (slot, roles) in SLOT_SOURCES {
        if let Some(reference) = roles.iter().find_map(|&ty| material.texture(ty)) {
            resolved.textures.push(TextureBinding {
                slot,
                reference: reference.to_string(),
                srgb: slot.is_srgb(),
            });
        }
    }

    let packed = resolved
        .textures
        .iter()
        .find(|b| b.slot == TextureSlot::OcclusionMetallicRoughness)
        .map(|b| b.reference.clone());
    let occlusion = material
        .texture(TextureType::AmbientOcclusion)
        .or_else(|| material.texture(TextureType::Lightmap));
    if let Some(occlusion) = occlusion {
        if packed.as_deref() != Some(occlusion) {
            resolved.textures.push(TextureBinding {
                slot: TextureSlot::AmbientOcclusion,
                reference: occlusion.to_string(),
                srgb: false,
            });
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pbr(metallic: Option<f32>) -> SceneMaterial {
        SceneMaterial {
            metallic_factor: metallic,
            ..SceneMaterial::named("m")
        }
        .with_texture(TextureType::BaseColor, "albedo.png")
        .with_texture(TextureType::Normals, "normal.png")
    }

    fn slot_of<'a>(resolved: &'a ResolvedMaterial, slot: TextureSlot) -> Option<&'a TextureBinding> {
        resolved.textures.iter().find(|b| b.slot == slot)
    }

    #[test]
    fn aliases_share_indices() {
        assert_eq!(TextureSlot::DIFFUSE.index(), 0);
        assert_eq!(TextureSlot::NORMAL_CAMERA.index(), 1);
        assert_eq!(TextureSlot::SHININESS.index(), 2);
        assert_eq!(TextureSlot::DIFFUSE_ROUGHNESS.index(), 2);
        assert_eq!(TextureSlot::Emissive.index(), 3);
        assert_eq!(TextureSlot::SPECULAR.index(), 4);
        assert_eq!(TextureSlot::LIGHTMAP.index(), 5);
    }

    #[test]
    fn default_gate_needs_positive_metallic() {
        let policy = TexturePolicy::default();
        assert!(policy.admits(&pbr(Some(1.0))));
        assert!(!policy.admits(&pbr(Some(0.0))));
        assert!(!policy.admits(&pbr(None)));
        assert!(TexturePolicy::AnyPbr.admits(&pbr(None)));

        let unlit = SceneMaterial {
            shading_model: ShadingModel::Unlit,
            ..pbr(Some(1.0))
        };
        assert!(!TexturePolicy::AnyPbr.admits(&unlit));
        assert!(TexturePolicy::Always.admits(&unlit));
    }

    #[test]
    fn rejected_materials_keep_colors() {
        let material = SceneMaterial {
            base_color: Some(Color::rgb(0.5, 0.25, 1.0)),
            ..pbr(Some(0.0))
        };
        let resolved = resolve(&material, TexturePolicy::default());
        assert!(resolved.textures.is_empty());
        assert_eq!(resolved.base_color, Color::rgb(0.5, 0.25, 1.0));
        assert_eq!(resolved.emissive_color, Color::BLACK);
        assert_eq!(resolved.specular_color, Color::BLACK);
    }

    #[test]
    fn slots_and_color_spaces() {
        let material = pbr(Some(1.0))
            .with_texture(TextureType::Metalness, "orm.png")
            .with_texture(TextureType::Emissive, "glow.png");
        let resolved = resolve(&material, TexturePolicy::default());

        let base = slot_of(&resolved, TextureSlot::BaseColor).unwrap();
        assert_eq!(base.reference, "albedo.png");
        assert!(base.srgb);
        assert!(!slot_of(&resolved, TextureSlot::Normal).unwrap().srgb);
        assert!(!slot_of(&resolved, TextureSlot::OcclusionMetallicRoughness).unwrap().srgb);
        assert!(slot_of(&resolved, TextureSlot::Emissive).unwrap().srgb);
        assert!(slot_of(&resolved, TextureSlot::SPECULAR).is_none());
    }

    #[test]
    fn diffuse_backs_up_base_color() {
        let material = SceneMaterial {
            metallic_factor: Some(1.0),
            ..SceneMaterial::named("legacy")
        }
        .with_texture(TextureType::Diffuse, "diffuse.png")
        .with_texture(TextureType::Specular, "spec.png");
        let resolved = resolve(&material, TexturePolicy::default());
        assert_eq!(
            slot_of(&resolved, TextureSlot::DIFFUSE).map(|b| b.reference.as_str()),
            Some("diffuse.png")
        );
        assert_eq!(
            slot_of(&resolved, TextureSlot::SPECULAR).map(|b| b.reference.as_str()),
            Some("spec.png")
        );
    }

    #[test]
    fn packed_occlusion_is_not_bound_twice() {
        let packed = pbr(Some(1.0))
            .with_texture(TextureType::Metalness, "orm.png")
            .with_texture(TextureType::Lightmap, "orm.png");
        let resolved = resolve(&packed, TexturePolicy::default());
        assert!(slot_of(&resolved, TextureSlot::AmbientOcclusion).is_none());

        let separate = pbr(Some(1.0))
            .with_texture(TextureType::Metalness, "mr.png")
            .with_texture(TextureType::AmbientOcclusion, "ao.png");
        let resolved = resolve(&separate, TexturePolicy::default());
        let ao = slot_of(&resolved, TextureSlot::AmbientOcclusion).unwrap();
        assert_eq!(ao.reference, "ao.png");
        assert!(!ao.srgb);
    }
}
