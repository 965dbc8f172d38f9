//! Material translation: shader script → engine-agnostic material
//!
//! The shader table is a closed enum mapping each known shader to an
//! archetype. Blend parameters then override the archetype with the
//! priority `$additive` > `$alphatest` > `$translucent`. Translation never
//! fails; bad parameter values are skipped with a warning.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use hashbrown::HashMap;
use vsrc_common::material::{PLACEHOLDER_COLOR, slot};
use vsrc_common::{Archetype, Diagnostics, Material, SlotValue, Warning};
use vsrc_vmt::{MaterialDocument, ParseOptions, normalize_texture_path, parse_material};

/// Patch materials may include other patches; this bounds the chain
const MAX_PATCH_DEPTH: usize = 8;

/// Shaders the translator knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    LightmappedGeneric,
    VertexLitGeneric,
    UnlitGeneric,
    UnlitTwoTexture,
    WorldVertexTransition,
    Lightmapped4WayBlend,
    WorldTwoTextureBlend,
    LightmappedReflective,
    Water,
    Refract,
    Sprite,
    SpriteCard,
    Modulate,
    DecalModulate,
    Cable,
    Sky,
    Eyes,
    EyeRefract,
    Teeth,
}

impl ShaderKind {
    const TABLE: [(&'static str, ShaderKind); 19] = [
        ("lightmappedgeneric", ShaderKind::LightmappedGeneric),
        ("vertexlitgeneric", ShaderKind::VertexLitGeneric),
        ("unlitgeneric", ShaderKind::UnlitGeneric),
        ("unlittwotexture", ShaderKind::UnlitTwoTexture),
        ("worldvertextransition", ShaderKind::WorldVertexTransition),
        ("lightmapped_4wayblend", ShaderKind::Lightmapped4WayBlend),
        ("worldtwotextureblend", ShaderKind::WorldTwoTextureBlend),
        ("lightmappedreflective", ShaderKind::LightmappedReflective),
        ("water", ShaderKind::Water),
        ("refract", ShaderKind::Refract),
        ("sprite", ShaderKind::Sprite),
        ("spritecard", ShaderKind::SpriteCard),
        ("modulate", ShaderKind::Modulate),
        ("decalmodulate", ShaderKind::DecalModulate),
        ("cable", ShaderKind::Cable),
        ("sky", ShaderKind::Sky),
        ("eyes", ShaderKind::Eyes),
        ("eyerefract", ShaderKind::EyeRefract),
        ("teeth", ShaderKind::Teeth),
    ];

    /// Look up a shader name, ignoring case and fallback suffixes such as
    /// `_DX9` or `_HDR_DX9`
    pub fn from_name(name: &str) -> Option<Self> {
        let mut name = name.trim().to_ascii_lowercase();
        for suffix in ["_dx9", "_dx8", "_dx6", "_hdr"] {
            if let Some(stripped) = name.strip_suffix(suffix) {
                name = stripped.to_string();
            }
        }
        Self::TABLE
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| *kind)
    }

    pub fn archetype(self) -> Archetype {
        use ShaderKind::*;
        match self {
            WorldVertexTransition | Lightmapped4WayBlend => Archetype::BlendedTerrain,
            Water | Refract | Modulate | DecalModulate => Archetype::Translucent,
            Sprite | SpriteCard => Archetype::Additive,
            _ => Archetype::Opaque,
        }
    }

    pub fn is_unlit(self) -> bool {
        use ShaderKind::*;
        matches!(
            self,
            UnlitGeneric | UnlitTwoTexture | Sprite | SpriteCard | Sky | Modulate | DecalModulate
        )
    }
}

/// Apply the blend parameters on top of the shader archetype
pub fn blend_archetype(base: Archetype, doc: &MaterialDocument) -> Archetype {
    if doc.flag("$additive") {
        Archetype::Additive
    } else if doc.flag("$alphatest") {
        Archetype::Masked
    } else if doc.flag("$translucent") {
        Archetype::Translucent
    } else {
        base
    }
}

fn scalar(doc: &MaterialDocument, key: &str, diag: &mut Diagnostics) -> Option<f32> {
    let param = doc.get(key)?;
    let value = param.value.as_f32();
    if value.is_none() {
        diag.warn(Warning::UnexpectedParameter {
            key: param.key.clone(),
            value: param.raw.clone(),
            expected: "number",
        });
    }
    value
}

fn color(doc: &MaterialDocument, key: &str, diag: &mut Diagnostics) -> Option<[f32; 4]> {
    let param = doc.get(key)?;
    let value = param.value.as_vec4();
    if value.is_none() {
        diag.warn(Warning::UnexpectedParameter {
            key: param.key.clone(),
            value: param.raw.clone(),
            expected: "color",
        });
    }
    value.map(|v| v.to_array())
}

fn bind_texture(material: &mut Material, slot: &str, doc: &MaterialDocument, keys: &[&str]) {
    if let Some(path) = keys.iter().find_map(|k| doc.texture(k)) {
        material.slots.insert(slot.to_string(), SlotValue::Texture(path));
    }
}

/// Translate a parsed script into a material. Never fails.
pub fn translate_material(name: &str, doc: &MaterialDocument, diag: &mut Diagnostics) -> Material {
    let kind = ShaderKind::from_name(&doc.shader);
    if kind.is_none() {
        diag.warn(Warning::UnknownShader {
            material: name.to_string(),
            shader: doc.shader.clone(),
        });
    }

    let base = kind.map(ShaderKind::archetype).unwrap_or(Archetype::Opaque);
    let mut material = Material::placeholder(name);
    material.shader = doc.shader.clone();
    material.archetype = blend_archetype(base, doc);
    material.keywords = doc.keywords();
    material.surface_prop = doc.surface_prop().map(str::to_string);

    bind_texture(&mut material, slot::BASE_COLOR, doc, &["$basetexture"]);
    if !material.slots.contains_key(slot::BASE_COLOR) {
        material
            .slots
            .insert(slot::BASE_COLOR.into(), SlotValue::Color(PLACEHOLDER_COLOR));
    }
    let Some(kind) = kind else {
        return material;
    };

    bind_texture(&mut material, slot::NORMAL, doc, &["$bumpmap", "$normalmap"]);
    if kind.archetype() == Archetype::BlendedTerrain {
        bind_texture(&mut material, slot::BASE_COLOR_2, doc, &["$basetexture2"]);
        bind_texture(&mut material, slot::NORMAL_2, doc, &["$bumpmap2"]);
        bind_texture(&mut material, slot::BLEND_MODULATE, doc, &["$blendmodulatetexture"]);
        material.slots.insert(slot::VERTEX_COLOR.into(), SlotValue::Bool(true));
    }
    if kind == ShaderKind::UnlitTwoTexture || kind == ShaderKind::WorldTwoTextureBlend {
        bind_texture(&mut material, slot::BASE_COLOR_2, doc, &["$texture2"]);
    }

    let tint_key = if kind == ShaderKind::VertexLitGeneric && doc.contains("$color2") {
        "$color2"
    } else {
        "$color"
    };
    let tint = color(doc, tint_key, diag).unwrap_or([1.0; 4]);
    material.slots.insert(slot::TINT.into(), SlotValue::Color(tint));

    let opacity = scalar(doc, "$alpha", diag).unwrap_or(1.0).clamp(0.0, 1.0);
    material.slots.insert(slot::OPACITY.into(), SlotValue::Scalar(opacity));
    if material.archetype == Archetype::Masked {
        let cutoff = scalar(doc, "$alphatestreference", diag).unwrap_or(0.5);
        material
            .slots
            .insert(slot::ALPHA_CUTOFF.into(), SlotValue::Scalar(cutoff));
    }

    // Source has no roughness; approximate it from the phong exponent
    let roughness = if doc.flag("$phong") {
        let exponent = scalar(doc, "$phongexponent", diag).unwrap_or(5.0).max(0.0);
        (2.0 / (exponent + 2.0)).sqrt()
    } else {
        1.0
    };
    material
        .slots
        .insert(slot::ROUGHNESS.into(), SlotValue::Scalar(roughness));
    material.slots.insert(slot::METALLIC.into(), SlotValue::Scalar(0.0));

    if doc.texture("$envmap").is_some() {
        bind_texture(&mut material, slot::ENVMAP_MASK, doc, &["$envmapmask"]);
        let envmap_tint = color(doc, "$envmaptint", diag).unwrap_or([1.0; 4]);
        material
            .slots
            .insert(slot::ENVMAP_TINT.into(), SlotValue::Color(envmap_tint));
    }

    if doc.flag("$selfillum") {
        let emissive = doc
            .texture("$selfillummask")
            .map(SlotValue::Texture)
            .unwrap_or(SlotValue::Bool(true));
        material.slots.insert(slot::EMISSIVE.into(), emissive);
    }

    if let Some(detail) = doc.texture("$detail") {
        material.slots.insert(slot::DETAIL.into(), SlotValue::Texture(detail));
        let scale = scalar(doc, "$detailscale", diag).unwrap_or(4.0);
        material
            .slots
            .insert(slot::DETAIL_SCALE.into(), SlotValue::Scalar(scale));
    }

    if let Some(transform) = doc.texture_transform("$basetexturetransform") {
        material
            .slots
            .insert(slot::UV_TRANSFORM.into(), SlotValue::Transform(transform));
    }
    if doc.flag("$nocull") {
        material.slots.insert(slot::TWO_SIDED.into(), SlotValue::Bool(true));
    }
    if kind.is_unlit() {
        material.slots.insert(slot::UNLIT.into(), SlotValue::Bool(true));
    }
    if doc.flag("$vertexcolor") {
        material.slots.insert(slot::VERTEX_COLOR.into(), SlotValue::Bool(true));
    }
    material
}

/// Normalise a material reference: forward slashes, lowercase, no
/// `materials/` prefix or `.vmt` extension
pub fn normalize_material_name(raw: &str) -> String {
    let lower = raw.trim().replace('\\', "/").to_ascii_lowercase();
    let trimmed = lower.strip_suffix(".vmt").unwrap_or(&lower);
    normalize_texture_path(trimmed)
}

/// Lookup of material scripts by name, from search roots or registered
/// in memory. Read-only once built, so it can be shared across workers.
#[derive(Debug, Clone, Default)]
pub struct MaterialSet {
    roots: Vec<PathBuf>,
    inline: HashMap<String, String>,
    options: ParseOptions,
}

impl MaterialSet {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            roots: Vec::new(),
            inline: HashMap::new(),
            options,
        }
    }

    /// Add a `materials/` directory to search
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    pub fn insert(&mut self, name: &str, text: impl Into<String>) {
        self.inline.insert(normalize_material_name(name), text.into());
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    fn path_in(root: &Path, name: &str) -> PathBuf {
        root.join(format!("{}.vmt", name))
    }

    fn text(&self, name: &str) -> Option<String> {
        if let Some(text) = self.inline.get(name) {
            return Some(text.clone());
        }
        self.roots
            .iter()
            .map(|root| Self::path_in(root, name))
            .find(|path| path.is_file())
            .and_then(|path| std::fs::read(&path).ok())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = normalize_material_name(name);
        self.inline.contains_key(&name)
            || self
                .roots
                .iter()
                .any(|root| Self::path_in(root, &name).is_file())
    }

    /// Parse a material, following `patch` includes
    pub fn document(&self, name: &str) -> Result<Option<MaterialDocument>> {
        let name = normalize_material_name(name);
        let Some(text) = self.text(&name) else {
            return Ok(None);
        };
        let doc = parse_material(&text, &self.options)
            .with_context(|| format!("Failed to parse material '{}'", name))?;
        self.resolve(doc, &name, 0).map(Some)
    }

    fn resolve(&self, doc: MaterialDocument, name: &str, depth: usize) -> Result<MaterialDocument> {
        let Some(include) = doc.include() else {
            return Ok(doc);
        };
        if depth >= MAX_PATCH_DEPTH {
            bail!("Patch chain of '{}' is deeper than {}", name, MAX_PATCH_DEPTH);
        }
        let base_name = normalize_material_name(&include);
        let text = self
            .text(&base_name)
            .with_context(|| format!("Patch '{}' includes missing material '{}'", name, base_name))?;
        let base = parse_material(&text, &self.options)
            .with_context(|| format!("Failed to parse material '{}'", base_name))?;
        let base = self.resolve(base, &base_name, depth + 1)?;
        Ok(doc.resolve_patch(&base)?)
    }

    /// Translated material, or a placeholder with a warning when the
    /// script is missing or unreadable
    pub fn material(&self, name: &str, diag: &mut Diagnostics) -> Material {
        let name = normalize_material_name(name);
        match self.document(&name) {
            Ok(Some(doc)) => translate_material(&name, &doc, diag),
            Ok(None) => {
                diag.warn(Warning::MissingMaterial(name.clone()));
                Material::placeholder(name)
            }
            Err(e) => {
                diag.skipped(format!("material {}", name), format!("{:#}", e));
                Material::placeholder(name)
            }
        }
    }
}
