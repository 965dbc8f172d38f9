//! Single-asset conversion: read a source file, decode, transform, emit
//!
//! Every function returns the paths written. Content problems are recorded
//! in the caller's [`Diagnostics`]; structural failures are errors that
//! abort only the asset being converted.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::{Path, PathBuf};
use vsrc_bsp::{Entity, StaticProps, decode_level};
use vsrc_common::{Asset, AssetEmitter, AudioCodec, DecodeError, Diagnostics, Material};
use vsrc_mdl::{ModelFiles, VTX_EXTENSIONS, decode_model};
use vsrc_script::{
    Manifest as ScriptManifest, ScriptError, ScriptKind, SoundScript, detect_script,
    merge_soundscape, parse_details, parse_sound_manifest, parse_sound_script,
    parse_soundscape_manifest, parse_soundscapes,
};
use vsrc_vmt::parse_material;
use vsrc_vtf::decode_texture;

use crate::audio::WavCodec;
use crate::emit::FileEmitter;
use crate::geometry::{GeometryOptions, reconstruct_level};
use crate::manifest::AssetKind;
use crate::material::{MaterialSet, normalize_material_name, translate_material};
use crate::model::{ModelOptions, assemble_model};

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))
}

fn read_text(path: &Path) -> Result<String> {
    Ok(String::from_utf8_lossy(&read(path)?).into_owned())
}

/// Everything in a level that is not geometry
#[derive(Debug, Serialize)]
pub struct LevelEntities {
    pub entities: Vec<Entity>,
    pub static_props: Option<StaticProps>,
    pub sky_faces: Vec<u32>,
}

fn emit_materials(
    prefix: &str,
    materials: &[Material],
    emitter: &mut FileEmitter,
) -> Result<Vec<PathBuf>> {
    materials
        .iter()
        .map(|m| emitter.emit(&format!("{}/materials/{}", prefix, m.name), Asset::Material(m)))
        .collect()
}

pub fn convert_level(
    path: &Path,
    name: &str,
    options: &GeometryOptions,
    materials: &MaterialSet,
    emitter: &mut FileEmitter,
    diag: &mut Diagnostics,
) -> Result<Vec<PathBuf>> {
    let data = read(path)?;
    let doc = decode_level(&data).with_context(|| format!("Failed to decode level {:?}", path))?;
    let geometry = reconstruct_level(&doc, options, diag);

    let mut outputs = Vec::new();
    for model in &geometry.models {
        for mesh in &model.meshes {
            let mesh_name = format!("{}/model{}/{}", name, model.index, mesh.name);
            outputs.push(emitter.emit(&mesh_name, Asset::Mesh(mesh))?);
        }
        if let Some(clip) = &model.collision {
            outputs.push(emitter.emit(&format!("{}/{}", name, clip.name), Asset::Mesh(clip))?);
        }
    }
    if let Some(lightmap) = &geometry.lightmap {
        outputs.push(emitter.emit(&format!("{}/lightmap", name), Asset::Texture(lightmap))?);
    }

    let translated: Vec<Material> = geometry
        .materials()
        .iter()
        .map(|m| materials.material(m, diag))
        .collect();
    outputs.extend(emit_materials(name, &translated, emitter)?);

    let static_props = match doc.static_props() {
        Ok(props) => props,
        Err(DecodeError::CompressedLump(lump)) => {
            diag.skipped(format!("{} static props", name), format!("{} lump is compressed", lump));
            None
        }
        Err(e) => {
            diag.skipped(format!("{} static props", name), e.to_string());
            None
        }
    };
    let entities = LevelEntities {
        entities: doc.entities(),
        static_props,
        sky_faces: geometry.sky_faces.clone(),
    };
    outputs.push(emitter.write_json(name, "entities.json", &entities)?);
    Ok(outputs)
}

pub fn convert_texture(path: &Path, name: &str, emitter: &mut FileEmitter) -> Result<Vec<PathBuf>> {
    let data = read(path)?;
    let texture = decode_texture(&data)
        .with_context(|| format!("Failed to decode texture {:?}", path))?
        .into_texture(name);
    Ok(vec![emitter.emit(name, Asset::Texture(&texture))?])
}

/// Translate a standalone material script. Patch includes resolve
/// through `materials`.
pub fn convert_material(
    path: &Path,
    name: &str,
    materials: &MaterialSet,
    emitter: &mut FileEmitter,
    diag: &mut Diagnostics,
) -> Result<Vec<PathBuf>> {
    let data = read(path)?;
    let text = String::from_utf8_lossy(&data);
    let mut doc = parse_material(&text, materials.options())
        .with_context(|| format!("Failed to parse material {:?}", path))?;
    if let Some(include) = doc.include() {
        let base = materials
            .document(&include)?
            .with_context(|| format!("Patch {:?} includes missing material '{}'", path, include))?;
        doc = doc.resolve_patch(&base)?;
    }
    let material = translate_material(&normalize_material_name(name), &doc, diag);
    Ok(vec![emitter.emit(name, Asset::Material(&material))?])
}

/// Companion file next to `mdl` with `suffix` replacing `.mdl`
fn companion(mdl: &Path, suffix: &str) -> Option<PathBuf> {
    let stem = mdl.file_stem()?.to_string_lossy();
    let path = mdl.with_file_name(format!("{}{}", stem, suffix));
    path.is_file().then_some(path)
}

pub fn convert_model(
    path: &Path,
    name: &str,
    options: &ModelOptions,
    materials: &MaterialSet,
    emitter: &mut FileEmitter,
    diag: &mut Diagnostics,
) -> Result<Vec<PathBuf>> {
    let mdl = read(path)?;
    let vvd = companion(path, ".vvd").map(|p| read(&p)).transpose()?;
    let vtx = VTX_EXTENSIONS
        .iter()
        .find_map(|ext| companion(path, ext))
        .map(|p| read(&p))
        .transpose()?;
    let phy = companion(path, ".phy").map(|p| read(&p)).transpose()?;

    let doc = decode_model(ModelFiles {
        mdl: &mdl,
        vvd: vvd.as_deref(),
        vtx: vtx.as_deref(),
        phy: phy.as_deref(),
    })
    .with_context(|| format!("Failed to decode model {:?}", path))?;
    let mut model = assemble_model(&doc, options, materials, diag)
        .with_context(|| format!("Failed to assemble model {:?}", path))?;

    if let Some(lod0) = model.lods.first_mut() {
        lod0.collision = std::mem::take(&mut model.collision);
    }

    let mut outputs = Vec::new();
    if model.skinned {
        outputs.push(emitter.emit(name, Asset::Skeleton(&model.skeleton))?);
    }
    for (lod, mesh) in model.lods.iter().enumerate() {
        outputs.push(emitter.emit(&format!("{}/lod{}", name, lod), Asset::Mesh(mesh))?);
    }
    for animation in &model.animations {
        let anim_name = format!("{}/anims/{}", name, animation.name);
        outputs.push(emitter.emit(&anim_name, Asset::Animation(animation))?);
    }
    outputs.extend(emit_materials(name, &model.materials, emitter)?);
    Ok(outputs)
}

pub fn convert_sound(path: &Path, name: &str, emitter: &mut FileEmitter) -> Result<Vec<PathBuf>> {
    let data = read(path)?;
    let sound = WavCodec
        .decode(&data)
        .with_context(|| format!("Failed to decode sound {:?}", path))?;
    Ok(vec![emitter.emit(name, Asset::Sound(&sound))?])
}

fn script_asset_kind(kind: ScriptKind) -> AssetKind {
    match kind {
        ScriptKind::Details => AssetKind::Details,
        ScriptKind::SoundManifest | ScriptKind::SoundScript => AssetKind::SoundScripts,
        ScriptKind::SoundscapeManifest | ScriptKind::Soundscapes => AssetKind::Soundscapes,
    }
}

/// Documents listed by a script manifest, in listed order. Paths resolve
/// against the directory above the manifest's own (`scripts/..`). Files
/// that are missing or fail to parse are skipped.
fn load_listed<T>(
    manifest_path: &Path,
    manifest: &ScriptManifest,
    diag: &mut Diagnostics,
    parse: impl Fn(&str, &mut Diagnostics) -> Result<T, ScriptError>,
) -> Vec<T> {
    let root = manifest_path
        .parent()
        .and_then(Path::parent)
        .unwrap_or(Path::new(""));
    let mut documents = Vec::with_capacity(manifest.files.len());
    for file in &manifest.files {
        let path = root.join(file);
        let text = match std::fs::read(&path) {
            Ok(data) => String::from_utf8_lossy(&data).into_owned(),
            Err(e) => {
                diag.skipped(format!("script {:?}", path), e.to_string());
                continue;
            }
        };
        match parse(&text, &mut *diag) {
            Ok(doc) => documents.push(doc),
            Err(e) => diag.skipped(format!("script {:?}", path), e.to_string()),
        }
    }
    documents
}

/// Convert a detail, sound or soundscape script (or one of their
/// manifests) to JSON. The family is detected from the content; when
/// `expected` is given a different family is an error.
pub fn convert_script(
    path: &Path,
    name: &str,
    expected: Option<AssetKind>,
    emitter: &mut FileEmitter,
    diag: &mut Diagnostics,
) -> Result<Vec<PathBuf>> {
    let text = read_text(path)?;
    let detected =
        detect_script(&text).with_context(|| format!("Failed to parse script {:?}", path))?;
    let kind = match (detected.map(script_asset_kind), expected) {
        (Some(found), Some(want)) if found != want => {
            bail!("{:?} holds {:?}, expected {:?}", path, found, want)
        }
        (Some(kind), _) | (None, Some(kind)) => kind,
        (None, None) => bail!("Unrecognized script {:?}", path),
    };

    let output = match kind {
        AssetKind::Details => {
            let types = parse_details(&text, diag)
                .with_context(|| format!("Failed to parse detail props {:?}", path))?;
            emitter.write_json(name, "details.json", &types)?
        }
        AssetKind::SoundScripts => {
            let script = if detected == Some(ScriptKind::SoundManifest) {
                let manifest = parse_sound_manifest(&text)?;
                load_listed(path, &manifest, diag, parse_sound_script)
                    .into_iter()
                    .fold(SoundScript::default(), |mut all, script| {
                        all.merge(script);
                        all
                    })
            } else {
                parse_sound_script(&text, diag)
                    .with_context(|| format!("Failed to parse sound script {:?}", path))?
            };
            tracing::debug!("{} sound entries from {:?}", script.entries.len(), path);
            emitter.write_json(name, "sounds.json", &script)?
        }
        AssetKind::Soundscapes => {
            let soundscapes = if detected == Some(ScriptKind::SoundscapeManifest) {
                let manifest = parse_soundscape_manifest(&text)?;
                let mut all = Vec::new();
                for list in load_listed(path, &manifest, diag, parse_soundscapes) {
                    for soundscape in list {
                        merge_soundscape(&mut all, soundscape);
                    }
                }
                all
            } else {
                parse_soundscapes(&text, diag)
                    .with_context(|| format!("Failed to parse soundscapes {:?}", path))?
            };
            emitter.write_json(name, "soundscapes.json", &soundscapes)?
        }
        other => bail!("{:?} is not a script kind", other),
    };
    Ok(vec![output])
}

fn describe_script(text: &str) -> Result<String> {
    let mut diag = Diagnostics::new();
    let summary = match detect_script(text)? {
        Some(ScriptKind::SoundManifest) => format!(
            "sound manifest: {} script files",
            parse_sound_manifest(text)?.files.len()
        ),
        Some(ScriptKind::SoundscapeManifest) => format!(
            "soundscape manifest: {} script files",
            parse_soundscape_manifest(text)?.files.len()
        ),
        Some(ScriptKind::Details) => {
            let types = parse_details(text, &mut diag)?;
            let groups = types.iter().map(|t| t.groups.len()).sum::<usize>();
            let props = types
                .iter()
                .flat_map(|t| &t.groups)
                .map(|g| g.props.len())
                .sum::<usize>();
            format!(
                "detail props: {} types, {} groups, {} props",
                types.len(),
                groups,
                props
            )
        }
        Some(ScriptKind::SoundScript) => {
            let script = parse_sound_script(text, &mut diag)?;
            let waves = script.entries.iter().map(|e| e.waves.len()).sum::<usize>();
            format!("sound script: {} entries, {} waves", script.entries.len(), waves)
        }
        Some(ScriptKind::Soundscapes) => {
            let soundscapes = parse_soundscapes(text, &mut diag)?;
            let rules = soundscapes.iter().map(|s| s.rules.len()).sum::<usize>();
            format!("soundscapes: {} soundscapes, {} rules", soundscapes.len(), rules)
        }
        None => bail!("Unrecognized script"),
    };
    Ok(summary)
}

/// One-paragraph summary of a source file's header
pub fn describe(path: &Path) -> Result<String> {
    let kind = match AssetKind::from_path(path) {
        Some(kind) => kind,
        None if AssetKind::SoundScripts.matches(path) => AssetKind::SoundScripts,
        None => bail!("Unrecognized source file {:?}", path),
    };
    let data = read(path)?;
    let summary = match kind {
        AssetKind::Level => {
            let doc = decode_level(&data)?;
            format!(
                "level v{} rev {}: {} models, {} faces, {} brushes, {} displacements, {} entities",
                doc.version,
                doc.map_revision,
                doc.models.len(),
                doc.faces.len(),
                doc.brushes.len(),
                doc.disp_infos.len(),
                doc.entities().len()
            )
        }
        AssetKind::Texture => {
            let doc = decode_texture(&data)?;
            let h = &doc.header;
            format!(
                "texture v{}.{}: {}x{}x{} {:?}, {} mips, {} frames, {} faces, flags {:#x}",
                h.version.0,
                h.version.1,
                h.width,
                h.height,
                h.depth,
                h.format,
                h.mip_count,
                h.frames,
                h.face_count(),
                h.flags
            )
        }
        AssetKind::Material => {
            let doc = parse_material(&String::from_utf8_lossy(&data), &Default::default())?;
            format!(
                "material: shader {}, {} parameters, {} blocks",
                doc.shader,
                doc.params.len(),
                doc.blocks.len()
            )
        }
        AssetKind::Model => {
            let doc = decode_model(ModelFiles {
                mdl: &data,
                ..Default::default()
            })?;
            format!(
                "model v{} '{}': {} bones, {} textures, {} body parts, {} animations, checksum {:#x}",
                doc.header.version,
                doc.name(),
                doc.bones.len(),
                doc.textures.len(),
                doc.body_parts.len(),
                doc.anim_descs.len(),
                doc.header.checksum
            )
        }
        AssetKind::Sound => {
            let sound = WavCodec.decode(&data)?;
            format!(
                "sound: {} Hz, {} channels, {:.2}s",
                sound.sample_rate,
                sound.channels,
                sound.duration_secs()
            )
        }
        AssetKind::Details | AssetKind::SoundScripts | AssetKind::Soundscapes => {
            describe_script(&String::from_utf8_lossy(&data))?
        }
    };
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::TextureFormat;

    #[test]
    fn test_companion_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mdl = dir.path().join("barrel.mdl");
        std::fs::write(&mdl, b"").unwrap();
        std::fs::write(dir.path().join("barrel.dx90.vtx"), b"").unwrap();
        assert!(companion(&mdl, ".vvd").is_none());
        assert_eq!(
            companion(&mdl, ".dx90.vtx"),
            Some(dir.path().join("barrel.dx90.vtx"))
        );
    }

    #[test]
    fn test_material_patch_resolves_through_set() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("wall_patch.vmt");
        std::fs::write(
            &source,
            "patch { include \"materials/brick/base.vmt\" insert { \"$surfaceprop\" \"brick\" } }",
        )
        .unwrap();
        let mut set = MaterialSet::default();
        set.insert(
            "brick/base",
            "LightmappedGeneric { \"$basetexture\" \"brick/wall01\" }",
        );

        let out = tempfile::tempdir().unwrap();
        let mut emitter = FileEmitter::new(out.path(), TextureFormat::Png);
        let mut diag = Diagnostics::new();
        let written =
            convert_material(&source, "brick/wall_patch", &set, &mut emitter, &mut diag).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(json["surface_prop"], "brick");
        assert_eq!(json["shader"], "LightmappedGeneric");
        assert!(diag.is_empty());
    }

    #[test]
    fn test_sound_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("beep.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 11025,
            bits_per_sample: 8,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&source, spec).unwrap();
        for s in [0i8, 64, -64, 127] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let mut emitter = FileEmitter::new(dir.path().join("out"), TextureFormat::Png);
        let written = convert_sound(&source, "beep", &mut emitter).unwrap();
        let reader = hound::WavReader::open(&written[0]).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.spec().channels, 2);
        assert!(describe(&source).unwrap().contains("11025 Hz"));
    }

    #[test]
    fn test_describe_rejects_unknown_extension() {
        assert!(describe(Path::new("readme.md")).is_err());
    }

    #[test]
    fn test_sound_manifest_merges_listed_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        let manifest = scripts.join("game_sounds_manifest.txt");
        std::fs::write(
            &manifest,
            r#"
            game_sounds_manifest
            {
                "precache_file" "scripts/game_sounds.txt"
                "precache_file" "scripts/game_sounds_patch.txt"
                "precache_file" "scripts/missing.txt"
            }
            "#,
        )
        .unwrap();
        std::fs::write(
            scripts.join("game_sounds.txt"),
            r#"
            "Door.Open" { "channel" "CHAN_ITEM" "wave" "doors/open.wav" }
            "Door.Close" { "wave" "doors/close.wav" }
            "#,
        )
        .unwrap();
        std::fs::write(
            scripts.join("game_sounds_patch.txt"),
            r#""door.open" { "volume" "0.4,0.7" "wave" "doors/open2.wav" }"#,
        )
        .unwrap();

        let mut emitter = FileEmitter::new(dir.path().join("out"), TextureFormat::Png);
        let mut diag = Diagnostics::new();
        let written = convert_script(
            &manifest,
            "hl2",
            Some(AssetKind::SoundScripts),
            &mut emitter,
            &mut diag,
        )
        .unwrap();
        assert_eq!(written[0], dir.path().join("out/hl2.sounds.json"));
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&written[0]).unwrap()).unwrap();
        let entries = json["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["name"], "door.open");
        assert_eq!(entries[0]["channel"], 0);
        assert_eq!(entries[0]["waves"][0]["path"], "doors/open2.wav");
        // scripts/missing.txt
        assert_eq!(diag.len(), 1);

        assert!(describe(&manifest).unwrap().contains("3 script files"));
    }

    #[test]
    fn test_script_family_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("soundscapes_city.txt");
        std::fs::write(&source, r#""city" { "playlooping" { "wave" "wind.wav" } }"#).unwrap();

        let mut emitter = FileEmitter::new(dir.path().join("out"), TextureFormat::Png);
        let mut diag = Diagnostics::new();
        let err = convert_script(
            &source,
            "city",
            Some(AssetKind::SoundScripts),
            &mut emitter,
            &mut diag,
        )
        .unwrap_err();
        assert!(err.to_string().contains("expected SoundScripts"), "{}", err);

        let written = convert_script(&source, "city", None, &mut emitter, &mut diag).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(json[0]["rules"][0]["kind"], "looping");
        assert!(describe(&source).unwrap().starts_with("soundscapes: 1 soundscapes"));
    }
}
