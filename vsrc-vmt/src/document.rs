//! Material script document
//!
//! Flattens the KeyValues tree into a shader name plus an ordered parameter
//! list. Keys are unique ignoring ASCII case; a later duplicate overwrites
//! the value but keeps the first position. DX-level blocks such as
//! `">=dx90" { ... }` are merged in when they hold for the configured level,
//! and `[$PLATFORM]` conditions are evaluated for desktop builds.

use glam::Vec4;

use crate::error::VmtError;
use crate::keyvalues::{KeyValues, Node, parse_keyvalues, platform_condition_holds};
use crate::value::{Value, parse_texture_transform};

/// DX level used for conditional blocks unless configured otherwise
pub const DEFAULT_DX_LEVEL: u32 = 90;
/// GPU level used for `gpu>=N` blocks unless configured otherwise
pub const DEFAULT_GPU_LEVEL: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub dx_level: u32,
    pub gpu_level: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            dx_level: DEFAULT_DX_LEVEL,
            gpu_level: DEFAULT_GPU_LEVEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Key as first written
    pub key: String,
    pub raw: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialDocument {
    pub shader: String,
    pub params: Vec<Param>,
    /// Sub-blocks that are not conditions (`Proxies`, `insert`, `replace`)
    pub blocks: Vec<(String, KeyValues)>,
}

/// Parse a `.vmt` script
pub fn parse_material(text: &str, options: &ParseOptions) -> Result<MaterialDocument, VmtError> {
    let (shader, body) = parse_keyvalues(text)?;
    let mut doc = MaterialDocument {
        shader,
        ..Default::default()
    };
    doc.merge(&body, options);
    tracing::trace!(
        "Parsed material: shader {}, {} params, {} blocks",
        doc.shader,
        doc.params.len(),
        doc.blocks.len()
    );
    Ok(doc)
}

/// Evaluate a DX-level block key. `None` when the key is not a condition.
pub fn dx_condition(key: &str, options: &ParseOptions) -> Option<bool> {
    let key = key.trim().to_ascii_lowercase();
    let (op, rest) = split_operator(&key);
    let (actual, digits) = if let Some(digits) = rest.strip_prefix("dx") {
        (options.dx_level, digits)
    } else if let Some(digits) = rest.strip_prefix("gpu") {
        let (op, digits) = split_operator(digits);
        let level: u32 = digits.parse().ok()?;
        return Some(compare(op, options.gpu_level, level));
    } else {
        return None;
    };
    // "dx90_20b" style suffixes refine the shader model, not the level
    let digits = digits.split('_').next().unwrap_or(digits);
    let mut level: u32 = digits.parse().ok()?;
    if level < 10 {
        level *= 10;
    }
    Some(compare(op, actual, level))
}

fn split_operator(text: &str) -> (&str, &str) {
    for op in [">=", "<=", ">", "<"] {
        if let Some(rest) = text.strip_prefix(op) {
            return (op, rest);
        }
    }
    ("", text)
}

fn compare(op: &str, actual: u32, level: u32) -> bool {
    match op {
        ">=" => actual >= level,
        "<=" => actual <= level,
        ">" => actual > level,
        "<" => actual < level,
        _ => actual == level,
    }
}

impl MaterialDocument {
    fn merge(&mut self, group: &KeyValues, options: &ParseOptions) {
        for entry in &group.entries {
            let enabled = entry
                .condition
                .as_deref()
                .is_none_or(platform_condition_holds);
            if !enabled {
                continue;
            }
            match &entry.node {
                Node::Value(raw) => self.set(&entry.key, raw),
                Node::Group(inner) => match dx_condition(&entry.key, options) {
                    Some(true) => self.merge(inner, options),
                    Some(false) => {}
                    None => self.set_block(&entry.key, inner.clone()),
                },
            }
        }
    }

    /// Insert or overwrite a parameter
    pub fn set(&mut self, key: &str, raw: &str) {
        let value = Value::parse(raw);
        match self.params.iter_mut().find(|p| p.key.eq_ignore_ascii_case(key)) {
            Some(param) => {
                param.raw = raw.to_string();
                param.value = value;
            }
            None => self.params.push(Param {
                key: key.to_string(),
                raw: raw.to_string(),
                value,
            }),
        }
    }

    fn set_block(&mut self, key: &str, block: KeyValues) {
        match self.blocks.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some((_, existing)) => *existing = block,
            None => self.blocks.push((key.to_string(), block)),
        }
    }

    pub fn shader_is(&self, name: &str) -> bool {
        self.shader.eq_ignore_ascii_case(name)
    }

    pub fn get(&self, key: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.key.eq_ignore_ascii_case(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.get(key).map(|p| &p.value)
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.get(key).map(|p| p.raw.as_str())
    }

    pub fn f32(&self, key: &str) -> Option<f32> {
        self.value(key)?.as_f32()
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.value(key)?.as_bool()
    }

    /// True when the flag parameter is present and non-zero
    pub fn flag(&self, key: &str) -> bool {
        self.bool(key).unwrap_or(false)
    }

    pub fn vec4(&self, key: &str) -> Option<Vec4> {
        self.value(key)?.as_vec4()
    }

    /// Texture path parameter, normalised to lowercase forward slashes
    /// without a `materials/` prefix or `.vtf` extension
    pub fn texture(&self, key: &str) -> Option<String> {
        let raw = self.raw(key)?.trim();
        if raw.is_empty() {
            return None;
        }
        Some(normalize_texture_path(raw))
    }

    pub fn texture_transform(&self, key: &str) -> Option<[f32; 6]> {
        parse_texture_transform(self.raw(key)?)
    }

    /// `$keywords`, split on commas
    pub fn keywords(&self) -> Vec<String> {
        self.raw("$keywords")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn surface_prop(&self) -> Option<&str> {
        self.raw("$surfaceprop")
    }

    pub fn block(&self, key: &str) -> Option<&KeyValues> {
        self.blocks
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, b)| b)
    }

    pub fn is_patch(&self) -> bool {
        self.shader_is("patch")
    }

    /// Path of the material a patch applies to
    pub fn include(&self) -> Option<String> {
        if !self.is_patch() {
            return None;
        }
        self.raw("include").map(|p| p.trim().replace('\\', "/"))
    }

    /// Apply this patch on top of `base`.
    ///
    /// `insert` entries are added or overwrite; `replace` entries only
    /// overwrite keys the base already has.
    pub fn resolve_patch(&self, base: &MaterialDocument) -> Result<MaterialDocument, VmtError> {
        if self.include().is_none() {
            return Err(VmtError::PatchWithoutInclude);
        }
        let mut out = base.clone();
        if let Some(insert) = self.block("insert") {
            for entry in &insert.entries {
                match &entry.node {
                    Node::Value(raw) => out.set(&entry.key, raw),
                    Node::Group(g) => out.set_block(&entry.key, g.clone()),
                }
            }
        }
        if let Some(replace) = self.block("replace") {
            for entry in &replace.entries {
                match &entry.node {
                    Node::Value(raw) if out.contains(&entry.key) => out.set(&entry.key, raw),
                    Node::Group(g) if out.block(&entry.key).is_some() => {
                        out.set_block(&entry.key, g.clone())
                    }
                    _ => tracing::debug!(
                        "Patch replace of '{}' has nothing to replace in {}",
                        entry.key,
                        base.shader
                    ),
                }
            }
        }
        Ok(out)
    }
}

pub fn normalize_texture_path(raw: &str) -> String {
    let mut path = raw.trim().replace('\\', "/").to_ascii_lowercase();
    if let Some(stripped) = path.strip_prefix("materials/") {
        path = stripped.to_string();
    }
    if let Some(stripped) = path.strip_suffix(".vtf") {
        path = stripped.to_string();
    }
    path.trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRICK: &str = r#"
"LightmappedGeneric"
{
    "$basetexture" "Brick\Wall01"
    "$BaseTexture" "brick/wall02"
    "$surfaceprop" "brick"
    "$keywords" "urban, wall ,,brick"
    "$translucent" 1
    "$color" "{255 0 0}"
    ">=dx90"
    {
        "$bumpmap" "brick/wall01_normal"
    }
    "<dx90"
    {
        "$basetexture" "brick/wall_dx8"
    }
    "$envmap" "env_cubemap" [$X360]
    "Proxies"
    {
        "TextureScroll" { "texturescrollvar" "$basetexturetransform" }
    }
}
"#;

    fn brick() -> MaterialDocument {
        parse_material(BRICK, &ParseOptions::default()).unwrap()
    }

    #[test]
    fn test_case_insensitive_unique_keys() {
        let doc = brick();
        assert!(doc.shader_is("lightmappedgeneric"));
        let count = doc
            .params
            .iter()
            .filter(|p| p.key.eq_ignore_ascii_case("$basetexture"))
            .count();
        assert_eq!(count, 1);
        assert_eq!(doc.texture("$BASETEXTURE").as_deref(), Some("brick/wall02"));
        // first spelling keeps its position
        assert_eq!(doc.params[0].key, "$basetexture");
    }

    #[test]
    fn test_typed_values() {
        let doc = brick();
        assert!(doc.flag("$translucent"));
        assert!(!doc.flag("$additive"));
        assert_eq!(doc.vec4("$color"), Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(doc.surface_prop(), Some("brick"));
        assert_eq!(doc.keywords(), vec!["urban", "wall", "brick"]);
    }

    #[test]
    fn test_dx_blocks_merge() {
        let doc = brick();
        assert_eq!(doc.texture("$bumpmap").as_deref(), Some("brick/wall01_normal"));
        assert_ne!(doc.texture("$basetexture").as_deref(), Some("brick/wall_dx8"));

        let dx8 = parse_material(
            BRICK,
            &ParseOptions {
                dx_level: 80,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(dx8.texture("$basetexture").as_deref(), Some("brick/wall_dx8"));
        assert!(dx8.texture("$bumpmap").is_none());
    }

    #[test]
    fn test_platform_condition_drops_entry() {
        assert!(!brick().contains("$envmap"));
    }

    #[test]
    fn test_blocks_kept() {
        let doc = brick();
        let proxies = doc.block("proxies").unwrap();
        assert!(proxies.group("TextureScroll").is_some());
    }

    #[test]
    fn test_dx_condition_forms() {
        let opts = ParseOptions::default();
        assert_eq!(dx_condition(">=dx90", &opts), Some(true));
        assert_eq!(dx_condition("<dx90", &opts), Some(false));
        assert_eq!(dx_condition(">dx9", &opts), Some(false));
        assert_eq!(dx_condition(">=DX90_20b", &opts), Some(true));
        assert_eq!(dx_condition("gpu>=2", &opts), Some(true));
        assert_eq!(dx_condition("Proxies", &opts), None);
        assert_eq!(dx_condition("dxlevel", &opts), None);
    }

    #[test]
    fn test_patch_resolution() {
        let base = brick();
        let patch = parse_material(
            r#"
            patch
            {
                include "materials/brick/wall01.vmt"
                insert { "$envmapmask" "brick/mask" }
                replace { "$surfaceprop" "concrete" "$detail" "ignored" }
            }
            "#,
            &ParseOptions::default(),
        )
        .unwrap();
        assert!(patch.is_patch());
        assert_eq!(patch.include().as_deref(), Some("materials/brick/wall01.vmt"));

        let resolved = patch.resolve_patch(&base).unwrap();
        assert!(resolved.shader_is("LightmappedGeneric"));
        assert_eq!(resolved.texture("$envmapmask").as_deref(), Some("brick/mask"));
        assert_eq!(resolved.surface_prop(), Some("concrete"));
        assert!(!resolved.contains("$detail"));
    }

    #[test]
    fn test_patch_without_include() {
        let patch = parse_material("patch { insert { a 1 } }", &ParseOptions::default()).unwrap();
        assert_eq!(
            patch.resolve_patch(&MaterialDocument::default()),
            Err(VmtError::PatchWithoutInclude)
        );
    }

    #[test]
    fn test_normalize_texture_path() {
        assert_eq!(normalize_texture_path("Materials\\Dev\\Dev_Blank.vtf"), "dev/dev_blank");
        assert_eq!(normalize_texture_path("/concrete/floor"), "concrete/floor");
    }
}
