//! Translated material: archetype selection plus slot bindings

use std::collections::BTreeMap;

use serde::Serialize;

/// Target material template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Opaque,
    Masked,
    Translucent,
    Additive,
    /// Two-layer terrain blended by per-vertex alpha
    BlendedTerrain,
}

impl Archetype {
    pub fn name(self) -> &'static str {
        match self {
            Archetype::Opaque => "opaque",
            Archetype::Masked => "masked",
            Archetype::Translucent => "translucent",
            Archetype::Additive => "additive",
            Archetype::BlendedTerrain => "blended_terrain",
        }
    }
}

/// Value bound to a material slot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SlotValue {
    /// Texture asset reference
    Texture(String),
    Scalar(f32),
    Color([f32; 4]),
    Bool(bool),
    /// 2x3 UV transform, row-major
    Transform([f32; 6]),
}

/// Engine-agnostic material
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    pub name: String,
    pub shader: String,
    pub archetype: Archetype,
    pub slots: BTreeMap<String, SlotValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface_prop: Option<String>,
}

impl Material {
    /// Flat grey opaque material used when nothing better is known
    pub fn placeholder(name: impl Into<String>) -> Self {
        let mut slots = BTreeMap::new();
        slots.insert(
            slot::BASE_COLOR.to_string(),
            SlotValue::Color(PLACEHOLDER_COLOR),
        );
        Self {
            name: name.into(),
            shader: String::new(),
            archetype: Archetype::Opaque,
            slots,
            keywords: Vec::new(),
            surface_prop: None,
        }
    }

    pub fn slot(&self, name: &str) -> Option<&SlotValue> {
        self.slots.get(name)
    }

    pub fn texture(&self, name: &str) -> Option<&str> {
        match self.slots.get(name) {
            Some(SlotValue::Texture(t)) => Some(t),
            _ => None,
        }
    }

    /// Every texture referenced by any slot
    pub fn textures(&self) -> impl Iterator<Item = &str> {
        self.slots.values().filter_map(|v| match v {
            SlotValue::Texture(t) => Some(t.as_str()),
            _ => None,
        })
    }
}

/// Placeholder base color (mid grey)
pub const PLACEHOLDER_COLOR: [f32; 4] = [0.5, 0.5, 0.5, 1.0];

/// Slot names used by the translator
pub mod slot {
    pub const BASE_COLOR: &str = "base_color";
    pub const BASE_COLOR_2: &str = "base_color_2";
    pub const NORMAL: &str = "normal";
    pub const NORMAL_2: &str = "normal_2";
    pub const ROUGHNESS: &str = "roughness";
    pub const METALLIC: &str = "metallic";
    pub const OPACITY: &str = "opacity";
    pub const ALPHA_CUTOFF: &str = "alpha_cutoff";
    pub const TINT: &str = "tint";
    pub const EMISSIVE: &str = "emissive";
    pub const ENVMAP_MASK: &str = "envmap_mask";
    pub const ENVMAP_TINT: &str = "envmap_tint";
    pub const DETAIL: &str = "detail";
    pub const DETAIL_SCALE: &str = "detail_scale";
    pub const BLEND_MODULATE: &str = "blend_modulate";
    pub const UV_TRANSFORM: &str = "uv_transform";
    pub const TWO_SIDED: &str = "two_sided";
    pub const UNLIT: &str = "unlit";
    pub const VERTEX_COLOR: &str = "vertex_color";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder() {
        let m = Material::placeholder("missing");
        assert_eq!(m.archetype, Archetype::Opaque);
        assert_eq!(
            m.slot(slot::BASE_COLOR),
            Some(&SlotValue::Color(PLACEHOLDER_COLOR))
        );
        assert_eq!(m.textures().count(), 0);
    }

    #[test]
    fn test_json_shape() {
        let mut m = Material::placeholder("brick");
        m.slots.insert(
            slot::NORMAL.into(),
            SlotValue::Texture("brick/brick_normal".into()),
        );
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["archetype"], "opaque");
        assert_eq!(json["slots"]["normal"]["type"], "texture");
        assert_eq!(json["slots"]["normal"]["value"], "brick/brick_normal");
        assert!(json.get("surface_prop").is_none());
    }
}
