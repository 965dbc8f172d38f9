//! Detail prop definitions (`detail.vbsp`)
//!
//! ```text
//! detail
//! {
//!     "grass_field"
//!     {
//!         "density" "800"
//!         "group1"
//!         {
//!             "alpha" "1"
//!             "tall_grass" { "sprite" "0 0 64 64 512" "spritesize" "0.5 0 16 24" "amount" "0.8" }
//!             "rock"       { "model" "models/props/rock01.mdl" "upright" "1" "amount" "0.2" }
//!         }
//!     }
//! }
//! ```
//!
//! Each detail type is named by the `$detailtype` of a blend material. The
//! level compiler scatters its props over displacement surfaces.

use serde::Serialize;
use vsrc_common::Diagnostics;
use vsrc_vmt::{KeyValues, Node, parse_keyvalues_document};

use crate::active_entries;
use crate::error::ScriptError;
use crate::number::leading_number;

pub const DETAIL_ROOT: &str = "detail";

/// `x y width height texture_size` when `sprite` omits fields
const DEFAULT_SPRITE: [f32; 5] = [0.0, 0.0, 64.0, 64.0, 512.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailOrientation {
    #[default]
    Normal,
    ScreenAligned,
    ScreenAlignedVertical,
}

impl DetailOrientation {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => DetailOrientation::ScreenAligned,
            2 => DetailOrientation::ScreenAlignedVertical,
            _ => DetailOrientation::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailSprite {
    /// Upper-left and lower-right UVs, inset half a texel
    pub uv_rect: [f32; 4],
    /// Anchor x, anchor y (fractions of the quad) then width and height in
    /// source inches
    pub size: [f32; 4],
    pub random_scale: f32,
    pub orientation: DetailOrientation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetailPropKind {
    Sprite(DetailSprite),
    Model { model: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailProp {
    pub name: String,
    /// Relative frequency within the group
    pub amount: f32,
    pub upright: bool,
    pub min_angle: f32,
    pub max_angle: f32,
    pub kind: DetailPropKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailGroup {
    pub name: String,
    /// Blend alpha at which this group is chosen
    pub alpha: f32,
    pub props: Vec<DetailProp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailType {
    pub name: String,
    /// Props per 1000 square inches
    pub density: f32,
    pub groups: Vec<DetailGroup>,
}

fn floats<const N: usize>(text: &str, defaults: [f32; N]) -> [f32; N] {
    let mut out = defaults;
    for (slot, word) in out.iter_mut().zip(text.split_whitespace()) {
        *slot = leading_number(word);
    }
    out
}

fn number(body: &KeyValues, key: &str, default: f32) -> f32 {
    body.value(key).map(leading_number).unwrap_or(default)
}

fn parse_sprite(body: &KeyValues, sprite: &str) -> DetailSprite {
    let [x, y, w, h, texture_size] = floats(sprite, DEFAULT_SPRITE);
    let texel = if texture_size > 0.0 { 1.0 / texture_size } else { 0.0 };
    let uv_rect = [
        (x + 0.5) * texel,
        (y + 0.5) * texel,
        (x + w - 0.5) * texel,
        (y + h - 0.5) * texel,
    ];
    let size = body
        .value("spritesize")
        .map(|s| floats(s, [0.5, 0.0, w, h]))
        .unwrap_or([0.5, 0.0, w, h]);
    DetailSprite {
        uv_rect,
        size,
        random_scale: number(body, "spriterandomscale", 0.0),
        orientation: DetailOrientation::from_raw(number(body, "detailorientation", 0.0) as u32),
    }
}

fn parse_prop(name: &str, body: &KeyValues, diag: &mut Diagnostics) -> Option<DetailProp> {
    let kind = match (body.value("sprite"), body.value("model")) {
        (Some(sprite), _) => DetailPropKind::Sprite(parse_sprite(body, sprite)),
        (None, Some(model)) => DetailPropKind::Model {
            model: model.replace('\\', "/").to_ascii_lowercase(),
        },
        (None, None) => {
            diag.skipped(format!("detail prop '{}'", name), "has neither sprite nor model");
            return None;
        }
    };
    Some(DetailProp {
        name: name.to_string(),
        amount: number(body, "amount", 1.0),
        upright: body
            .value("upright")
            .is_some_and(|v| leading_number(v) != 0.0),
        min_angle: number(body, "minangle", 180.0),
        max_angle: number(body, "maxangle", 180.0),
        kind,
    })
}

fn groups<'a>(body: &'a KeyValues) -> impl Iterator<Item = (&'a str, &'a KeyValues)> {
    active_entries(body).filter_map(|e| match &e.node {
        Node::Group(group) => Some((e.key.as_str(), group)),
        Node::Value(_) => None,
    })
}

pub fn details_from_keyvalues(
    doc: &KeyValues,
    diag: &mut Diagnostics,
) -> Result<Vec<DetailType>, ScriptError> {
    let root = doc
        .group(DETAIL_ROOT)
        .ok_or(ScriptError::MissingBlock(DETAIL_ROOT))?;
    let mut types = Vec::new();
    for (type_name, body) in groups(root) {
        let mut detail = DetailType {
            name: type_name.to_string(),
            density: number(body, "density", 0.0),
            groups: Vec::new(),
        };
        for (group_name, group_body) in groups(body) {
            let props = groups(group_body)
                .filter_map(|(prop_name, prop)| parse_prop(prop_name, prop, diag))
                .collect();
            detail.groups.push(DetailGroup {
                name: group_name.to_string(),
                alpha: number(group_body, "alpha", 1.0),
                props,
            });
        }
        types.push(detail);
    }
    Ok(types)
}

pub fn parse_details(text: &str, diag: &mut Diagnostics) -> Result<Vec<DetailType>, ScriptError> {
    let doc = parse_keyvalues_document(text)?;
    details_from_keyvalues(&doc, diag)
}
