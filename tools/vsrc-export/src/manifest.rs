//! Manifest parsing
//!
//! Parses convert.toml and expands it into a flat list of conversion jobs.
//!
//! ```toml
//! [output]
//! dir = "out/"
//!
//! [settings]
//! scale = 0.0254
//! up_axis = "y"
//! texture_format = "bc7"
//! material_roots = ["hl2/materials"]
//!
//! [levels]
//! d1_trainstation = "maps/d1_trainstation_01.bsp"
//!
//! [models]
//! barrel = { path = "models/props_c17/oildrum001.mdl", skin = 1 }
//!
//! [textures]
//! brick = "materials/brick"   # directories are walked
//!
//! [details]
//! hl2 = "hl2/detail.vbsp"
//!
//! [sound_scripts]
//! hl2 = "hl2/scripts/game_sounds_manifest.txt"   # a manifest or one script
//!
//! [soundscapes]
//! hl2 = "hl2/scripts/soundscapes_manifest.txt"
//! ```

use anyhow::{Context, Result, bail};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vsrc_common::{CoordTransform, INCHES_TO_METERS};
use vsrc_vmt::ParseOptions;
use walkdir::WalkDir;

use crate::geometry::GeometryOptions;
use crate::geometry::lightmap::MAX_LIGHTMAP_PAGE;
use crate::material::MaterialSet;
use crate::model::ModelOptions;
use crate::texture::TextureFormat;

/// Root manifest structure
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub levels: HashMap<String, AssetEntry>,
    #[serde(default)]
    pub textures: HashMap<String, AssetEntry>,
    #[serde(default)]
    pub materials: HashMap<String, AssetEntry>,
    #[serde(default)]
    pub models: HashMap<String, AssetEntry>,
    #[serde(default)]
    pub sounds: HashMap<String, AssetEntry>,
    #[serde(default)]
    pub details: HashMap<String, AssetEntry>,
    #[serde(default)]
    pub sound_scripts: HashMap<String, AssetEntry>,
    #[serde(default)]
    pub soundscapes: HashMap<String, AssetEntry>,
    /// Directory relative entry paths resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("converted/")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpAxis {
    #[default]
    Y,
    Z,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Output units per source inch
    pub scale: f32,
    pub up_axis: UpAxis,
    pub lightmap_page: u32,
    pub texture_format: TextureFormat,
    pub smooth_normals: bool,
    pub collision: bool,
    pub bake_lightmaps: bool,
    pub dx_level: u32,
    pub gpu_level: u32,
    /// `materials/` directories to search for scripts
    pub material_roots: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let parse = ParseOptions::default();
        let geometry = GeometryOptions::default();
        Self {
            scale: INCHES_TO_METERS,
            up_axis: UpAxis::Y,
            lightmap_page: geometry.lightmap_page,
            texture_format: TextureFormat::Png,
            smooth_normals: geometry.smooth_normals,
            collision: geometry.collision,
            bake_lightmaps: geometry.bake_lightmaps,
            dx_level: parse.dx_level,
            gpu_level: parse.gpu_level,
            material_roots: Vec::new(),
        }
    }
}

impl Settings {
    pub fn transform(&self) -> CoordTransform {
        match self.up_axis {
            UpAxis::Y => CoordTransform::y_up(self.scale),
            UpAxis::Z => CoordTransform::z_up(self.scale),
        }
    }

    pub fn geometry_options(&self) -> GeometryOptions {
        GeometryOptions {
            transform: self.transform(),
            lightmap_page: self.lightmap_page,
            smooth_normals: self.smooth_normals,
            collision: self.collision,
            bake_lightmaps: self.bake_lightmaps,
        }
    }

    pub fn model_options(&self, skin_family: usize) -> ModelOptions {
        ModelOptions {
            transform: self.transform(),
            skin_family,
        }
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            dx_level: self.dx_level,
            gpu_level: self.gpu_level,
        }
    }

    /// Material set over the configured roots, resolved against `base`
    pub fn material_set(&self, base: &Path) -> MaterialSet {
        self.material_roots
            .iter()
            .fold(MaterialSet::new(self.parse_options()), |set, root| {
                set.with_root(base.join(root))
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AssetEntry {
    Simple(PathBuf),
    Detailed {
        path: PathBuf,
        /// Skin family for models
        #[serde(default)]
        skin: usize,
    },
}

impl AssetEntry {
    pub fn path(&self) -> &Path {
        match self {
            AssetEntry::Simple(p) => p,
            AssetEntry::Detailed { path, .. } => path,
        }
    }

    pub fn skin(&self) -> usize {
        match self {
            AssetEntry::Simple(_) => 0,
            AssetEntry::Detailed { skin, .. } => *skin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Level,
    Texture,
    Material,
    Model,
    Sound,
    Details,
    SoundScripts,
    Soundscapes,
}

impl AssetKind {
    /// Source file extensions picked up when walking a directory
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            AssetKind::Level => &["bsp"],
            AssetKind::Texture => &["vtf"],
            AssetKind::Material => &["vmt"],
            AssetKind::Model => &["mdl"],
            AssetKind::Sound => &["wav"],
            AssetKind::Details => &["vbsp"],
            AssetKind::SoundScripts | AssetKind::Soundscapes => &["txt"],
        }
    }

    /// Whether `path` has one of this kind's extensions
    pub fn matches(self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions()
                    .iter()
                    .any(|e| e.eq_ignore_ascii_case(ext))
            })
    }

    /// Kind by extension alone. Sound scripts and soundscapes share `.txt`
    /// and are told apart by content, see [`vsrc_script::detect_script`].
    pub fn from_path(path: &Path) -> Option<Self> {
        [
            AssetKind::Level,
            AssetKind::Texture,
            AssetKind::Material,
            AssetKind::Model,
            AssetKind::Sound,
            AssetKind::Details,
        ]
        .into_iter()
        .find(|kind| kind.matches(path))
    }
}

/// One source file to convert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Output name, `/` separated
    pub name: String,
    pub kind: AssetKind,
    pub path: PathBuf,
    pub skin: usize,
}

/// Load and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    let mut manifest: Manifest = toml::from_str(&content)
        .with_context(|| format!("Failed to parse manifest: {:?}", path))?;
    manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(manifest)
}

impl Manifest {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output.dir)
    }

    fn tables(&self) -> [(AssetKind, &HashMap<String, AssetEntry>); 8] {
        [
            (AssetKind::Level, &self.levels),
            (AssetKind::Texture, &self.textures),
            (AssetKind::Material, &self.materials),
            (AssetKind::Model, &self.models),
            (AssetKind::Sound, &self.sounds),
            (AssetKind::Details, &self.details),
            (AssetKind::SoundScripts, &self.sound_scripts),
            (AssetKind::Soundscapes, &self.soundscapes),
        ]
    }

    /// Flatten every table into jobs, walking directory entries. Sorted by
    /// kind then name.
    pub fn jobs(&self) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        for (kind, table) in self.tables() {
            for (name, entry) in table {
                let path = self.resolve(entry.path());
                if path.is_dir() {
                    jobs.extend(walk_dir(name, kind, &path, entry.skin())?);
                } else {
                    jobs.push(Job {
                        name: name.clone(),
                        kind,
                        path,
                        skin: entry.skin(),
                    });
                }
            }
        }
        jobs.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        Ok(jobs)
    }
}

fn walk_dir(prefix: &str, kind: AssetKind, dir: &Path, skin: usize) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", dir))?;
        if !entry.file_type().is_file() || !kind.matches(entry.path()) {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let stem = relative.with_extension("");
        let stem = stem.to_string_lossy().replace('\\', "/");
        jobs.push(Job {
            name: format!("{}/{}", prefix, stem),
            kind,
            path: entry.path().to_path_buf(),
            skin,
        });
    }
    Ok(jobs)
}

/// Validate a manifest without building
pub fn validate(manifest: &Manifest) -> Result<()> {
    let settings = &manifest.settings;
    if !(settings.scale.is_finite() && settings.scale > 0.0) {
        bail!("Scale must be positive, got {}", settings.scale);
    }
    if settings.lightmap_page == 0 || settings.lightmap_page > MAX_LIGHTMAP_PAGE {
        bail!(
            "Lightmap page must be in 1..={}, got {}",
            MAX_LIGHTMAP_PAGE,
            settings.lightmap_page
        );
    }
    for root in &settings.material_roots {
        let root = manifest.resolve(root);
        if !root.is_dir() {
            bail!("Material root not found: {:?}", root);
        }
    }
    for (kind, table) in manifest.tables() {
        for (name, entry) in table {
            let path = manifest.resolve(entry.path());
            if !path.exists() {
                bail!("{:?} '{}' source not found: {:?}", kind, name, path);
            }
            if path.is_file() && !kind.matches(&path) {
                bail!("{:?} '{}' has an unexpected extension: {:?}", kind, name, path);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn parse(text: &str) -> Manifest {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn test_defaults() {
        let manifest = parse("");
        assert_eq!(manifest.output.dir, PathBuf::from("converted/"));
        assert_eq!(manifest.settings.scale, INCHES_TO_METERS);
        assert_eq!(manifest.settings.up_axis, UpAxis::Y);
        assert_eq!(manifest.settings.dx_level, 90);
        assert_eq!(manifest.settings.texture_format, TextureFormat::Png);
        assert!(manifest.jobs().unwrap().is_empty());
    }

    #[test]
    fn test_settings_and_entries() {
        let manifest = parse(
            r#"
            [output]
            dir = "out"

            [settings]
            scale = 1.0
            up_axis = "z"
            texture_format = "bc7"
            smooth_normals = true

            [levels]
            map = "maps/test.bsp"

            [models]
            barrel = { path = "models/barrel.mdl", skin = 2 }
            "#,
        );
        assert_eq!(manifest.settings.texture_format, TextureFormat::Bc7);
        assert!(manifest.settings.smooth_normals);
        assert!(manifest.settings.collision);
        let transform = manifest.settings.transform();
        assert_eq!(transform.position(Vec3::Z), Vec3::Z);

        let jobs = manifest.jobs().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].kind, AssetKind::Level);
        assert_eq!(jobs[1].name, "barrel");
        assert_eq!(jobs[1].skin, 2);
    }

    #[test]
    fn test_y_up_transform() {
        let settings = Settings {
            scale: 2.0,
            ..Default::default()
        };
        assert_eq!(settings.transform().position(Vec3::Z), Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_unknown_texture_format_rejected() {
        let result: Result<Manifest, _> = toml::from_str("[settings]\ntexture_format = \"dds\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_directory_entries_are_walked() {
        let dir = tempfile::tempdir().unwrap();
        let textures = dir.path().join("tex");
        std::fs::create_dir_all(textures.join("brick")).unwrap();
        std::fs::write(textures.join("brick/wall.vtf"), b"").unwrap();
        std::fs::write(textures.join("a.VTF"), b"").unwrap();
        std::fs::write(textures.join("notes.txt"), b"").unwrap();

        let manifest_path = dir.path().join("convert.toml");
        std::fs::write(&manifest_path, "[textures]\nall = \"tex\"\n").unwrap();
        let manifest = load_manifest(&manifest_path).unwrap();
        validate(&manifest).unwrap();

        let names: Vec<String> = manifest.jobs().unwrap().into_iter().map(|j| j.name).collect();
        assert_eq!(names, vec!["all/a", "all/brick/wall"]);
    }

    #[test]
    fn test_script_tables() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        std::fs::write(scripts.join("game_sounds_manifest.txt"), b"").unwrap();
        std::fs::write(dir.path().join("detail.vbsp"), b"").unwrap();

        let manifest_path = dir.path().join("convert.toml");
        std::fs::write(
            &manifest_path,
            "[details]\nhl2 = \"detail.vbsp\"\n\n\
             [sound_scripts]\nhl2 = \"scripts/game_sounds_manifest.txt\"\n",
        )
        .unwrap();
        let manifest = load_manifest(&manifest_path).unwrap();
        validate(&manifest).unwrap();

        let kinds: Vec<AssetKind> = manifest.jobs().unwrap().into_iter().map(|j| j.kind).collect();
        assert_eq!(kinds, vec![AssetKind::Details, AssetKind::SoundScripts]);
        assert_eq!(AssetKind::from_path(Path::new("a.txt")), None);
        assert!(AssetKind::Soundscapes.matches(Path::new("scripts/soundscapes_city.TXT")));
        assert_eq!(
            serde_json::to_value(AssetKind::SoundScripts).unwrap(),
            "sound_scripts"
        );
    }

    #[test]
    fn test_validate_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("convert.toml");
        std::fs::write(&manifest_path, "[sounds]\nwind = \"missing.wav\"\n").unwrap();
        let manifest = load_manifest(&manifest_path).unwrap();
        let err = validate(&manifest).unwrap_err();
        assert!(err.to_string().contains("wind"));
    }
}
