//! vsrc-script: KeyValues game scripts
//!
//! Three document families share the KeyValues syntax of materials:
//!
//! - detail prop definitions (`detail.vbsp`), see [`parse_details`]
//! - sound scripts and their `game_sounds_manifest`, see [`parse_sound_script`]
//! - soundscapes and their `soundscapes_manifest`, see [`parse_soundscapes`]
//!
//! Entries guarded by a platform condition that does not hold on PC are
//! dropped while reading.

mod error;

pub mod detail;
pub mod number;
pub mod sound;
pub mod soundscape;

pub use detail::{
    DETAIL_ROOT, DetailGroup, DetailOrientation, DetailProp, DetailPropKind, DetailSprite,
    DetailType, details_from_keyvalues, parse_details,
};
pub use error::ScriptError;
pub use number::ValueRange;
pub use sound::{
    SOUND_MANIFEST_ROOT, SoundEntry, SoundScript, Wave, WaveFlag, parse_sound_entry,
    parse_sound_manifest, parse_sound_script,
};
pub use soundscape::{
    SOUNDSCAPE_MANIFEST_ROOT, RuleKind, Soundscape, SoundscapeRule, SubSoundscape,
    merge_soundscape, parse_soundscape_manifest, parse_soundscapes,
};

use serde::Serialize;
use vsrc_vmt::{Entry, KeyValues, Node, parse_keyvalues_document, platform_condition_holds};

/// Entries whose platform condition holds, in document order
pub(crate) fn active_entries(kv: &KeyValues) -> impl Iterator<Item = &Entry> {
    kv.entries
        .iter()
        .filter(|e| e.condition.as_deref().is_none_or(platform_condition_holds))
}

/// Script files listed by a manifest, `/` separated, in listed order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Manifest {
    pub files: Vec<String>,
}

impl Manifest {
    pub fn from_keyvalues(
        doc: &KeyValues,
        root: &'static str,
        keys: &[&str],
    ) -> Result<Self, ScriptError> {
        let block = doc.group(root).ok_or(ScriptError::MissingBlock(root))?;
        let files = active_entries(block)
            .filter(|e| keys.iter().any(|k| e.key.eq_ignore_ascii_case(k)))
            .filter_map(|e| match &e.node {
                Node::Value(path) => Some(path.replace('\\', "/")),
                Node::Group(_) => None,
            })
            .collect();
        Ok(Self { files })
    }
}

/// What a script document holds, judged from its root keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    SoundManifest,
    SoundscapeManifest,
    Details,
    SoundScript,
    Soundscapes,
}

impl ScriptKind {
    /// Manifests and detail files have a fixed root key. Otherwise a root
    /// block with a `play*` rule is a soundscape, and one with a `wave` or
    /// `rndwave` key is a sound script.
    pub fn detect(doc: &KeyValues) -> Option<Self> {
        if doc.group(SOUND_MANIFEST_ROOT).is_some() {
            return Some(ScriptKind::SoundManifest);
        }
        if doc.group(SOUNDSCAPE_MANIFEST_ROOT).is_some() {
            return Some(ScriptKind::SoundscapeManifest);
        }
        if doc.group(DETAIL_ROOT).is_some() {
            return Some(ScriptKind::Details);
        }
        for entry in &doc.entries {
            let body = match &entry.node {
                Node::Group(body) => body,
                Node::Value(_) => continue,
            };
            for inner in &body.entries {
                let key = inner.key.to_ascii_lowercase();
                if key.starts_with("play") {
                    return Some(ScriptKind::Soundscapes);
                }
                if key == "wave" || key == "rndwave" {
                    return Some(ScriptKind::SoundScript);
                }
            }
        }
        None
    }
}

/// Parse `text` and report its kind. `Ok(None)` for an unrecognized document.
pub fn detect_script(text: &str) -> Result<Option<ScriptKind>, ScriptError> {
    let doc = parse_keyvalues_document(text)?;
    Ok(ScriptKind::detect(&doc))
}
