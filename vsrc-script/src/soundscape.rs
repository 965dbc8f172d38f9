//! Soundscapes
//!
//! ```text
//! "canals.city_wind"
//! {
//!     "dsp"  "1"
//!     "playlooping" { "volume" "0.4" "wave" "ambient/wind/wind1.wav" }
//!     "playrandom"
//!     {
//!         "time"     "10,20"
//!         "position" "0"
//!         "rndwave"  { "wave" "ambient/birds1.wav" "wave" "ambient/birds2.wav" }
//!     }
//!     "playsoundscape" { "name" "canals.water" "volume" "0.5" }
//! }
//! ```
//!
//! Listed by `soundscapes_manifest` with `file` keys.

use serde::Serialize;
use vsrc_common::Diagnostics;
use vsrc_vmt::{KeyValues, Node, parse_keyvalues_document};

use crate::error::ScriptError;
use crate::number::{ValueRange, parse_range, parse_value};
use crate::sound::{SoundEntry, parse_sound_entry};
use crate::{Manifest, active_entries};

pub const SOUNDSCAPE_MANIFEST_ROOT: &str = "soundscapes_manifest";
pub const SOUNDSCAPE_MANIFEST_KEYS: &[&str] = &["file"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Looping,
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoundscapeRule {
    pub kind: RuleKind,
    /// Index of an `env_soundscape` position; `None` plays everywhere
    pub position: Option<u8>,
    /// Seconds between plays of a random rule
    pub time: Option<ValueRange<f32>>,
    pub sound: SoundEntry,
}

/// A nested `playsoundscape` reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubSoundscape {
    pub name: String,
    pub volume: f32,
    pub position: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Soundscape {
    pub name: String,
    pub dsp: u8,
    pub dsp_volume: f32,
    pub rules: Vec<SoundscapeRule>,
    pub children: Vec<SubSoundscape>,
}

fn position(body: &KeyValues) -> Option<u8> {
    body.value("position").map(|v| parse_value(v, &[]))
}

fn parse_soundscape(name: &str, body: &KeyValues, diag: &mut Diagnostics) -> Soundscape {
    let mut soundscape = Soundscape {
        name: name.to_string(),
        dsp: body.value("dsp").map(|v| parse_value(v, &[])).unwrap_or(0),
        dsp_volume: body.value("dsp_volume").map(|v| parse_value(v, &[])).unwrap_or(1.0),
        rules: Vec::new(),
        children: Vec::new(),
    };

    for entry in active_entries(body) {
        let group = match &entry.node {
            Node::Group(group) => group,
            Node::Value(_) => continue,
        };
        let kind = match entry.key.to_ascii_lowercase().as_str() {
            "playlooping" => RuleKind::Looping,
            "playrandom" => RuleKind::Random,
            "playsoundscape" => {
                match group.value("name") {
                    Some(child) => soundscape.children.push(SubSoundscape {
                        name: child.to_string(),
                        volume: group.value("volume").map(|v| parse_value(v, &[])).unwrap_or(1.0),
                        position: position(group),
                    }),
                    None => diag.skipped(format!("soundscape '{}' playsoundscape", name), "no name"),
                }
                continue;
            }
            other => {
                tracing::debug!("Soundscape '{}': ignoring block '{}'", name, other);
                continue;
            }
        };
        let time = match kind {
            RuleKind::Random => Some(parse_range(group.value("time"), &[], 0.0f32)),
            RuleKind::Looping => None,
        };
        soundscape.rules.push(SoundscapeRule {
            kind,
            position: position(group),
            time,
            sound: parse_sound_entry(name, group, diag),
        });
    }
    soundscape
}

/// Every soundscape in a file, in file order. A later duplicate name
/// replaces the earlier one.
pub fn soundscapes_from_keyvalues(doc: &KeyValues, diag: &mut Diagnostics) -> Vec<Soundscape> {
    let mut out: Vec<Soundscape> = Vec::new();
    for entry in active_entries(doc) {
        let soundscape = match &entry.node {
            Node::Group(body) => parse_soundscape(&entry.key, body, diag),
            Node::Value(_) => {
                diag.skipped(format!("soundscape '{}'", entry.key), "not a block");
                continue;
            }
        };
        merge_soundscape(&mut out, soundscape);
    }
    out
}

/// Insert by name, case-insensitive, replacing in place
pub fn merge_soundscape(list: &mut Vec<Soundscape>, soundscape: Soundscape) {
    match list
        .iter_mut()
        .find(|s| s.name.eq_ignore_ascii_case(&soundscape.name))
    {
        Some(existing) => *existing = soundscape,
        None => list.push(soundscape),
    }
}

pub fn parse_soundscapes(text: &str, diag: &mut Diagnostics) -> Result<Vec<Soundscape>, ScriptError> {
    let doc = parse_keyvalues_document(text)?;
    Ok(soundscapes_from_keyvalues(&doc, diag))
}

pub fn parse_soundscape_manifest(text: &str) -> Result<Manifest, ScriptError> {
    let doc = parse_keyvalues_document(text)?;
    Manifest::from_keyvalues(&doc, SOUNDSCAPE_MANIFEST_ROOT, SOUNDSCAPE_MANIFEST_KEYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANALS: &str = r#"
        "canals.city_wind"
        {
            "dsp" "1"
            "dsp_volume" "0.8"
            "playlooping"
            {
                "volume" "0.4"
                "pitch" "100"
                "wave" "ambient/wind/wind1.wav"
            }
            "playrandom"
            {
                "time" "10,20"
                "volume" "0.3,0.6"
                "position" "1"
                "soundlevel" "SNDLVL_140dB"
                "rndwave"
                {
                    "wave" "ambient/birds1.wav"
                    "wave" "ambient/birds2.wav"
                }
            }
            "playsoundscape" { "name" "canals.water" "volume" "0.5" }
            "playsoundscape" { "volume" "0.5" }
        }
    "#;

    #[test]
    fn test_rules_and_children() {
        let mut diag = Diagnostics::new();
        let scapes = parse_soundscapes(CANALS, &mut diag).unwrap();
        assert_eq!(scapes.len(), 1);
        let wind = &scapes[0];
        assert_eq!(wind.dsp, 1);
        assert_eq!(wind.dsp_volume, 0.8);
        assert_eq!(wind.rules.len(), 2);

        let looping = &wind.rules[0];
        assert_eq!(looping.kind, RuleKind::Looping);
        assert_eq!(looping.position, None);
        assert_eq!(looping.time, None);
        assert_eq!(looping.sound.volume, ValueRange::fixed(0.4));

        let random = &wind.rules[1];
        assert_eq!(random.kind, RuleKind::Random);
        assert_eq!(random.position, Some(1));
        assert_eq!(random.time, Some(ValueRange { min: 10.0, max: 20.0 }));
        assert_eq!(random.sound.volume, ValueRange { min: 0.3, max: 0.6 });
        assert_eq!(random.sound.sound_level, ValueRange::fixed(140));
        assert_eq!(random.sound.waves.len(), 2);

        assert_eq!(wind.children.len(), 1);
        assert_eq!(wind.children[0].name, "canals.water");
        assert_eq!(wind.children[0].volume, 0.5);
        // nameless playsoundscape
        assert_eq!(diag.len(), 1);
    }

    #[test]
    fn test_defaults_and_duplicates() {
        let mut diag = Diagnostics::new();
        let scapes = parse_soundscapes(
            "\"a\" { \"playlooping\" { \"wave\" \"x.wav\" } } \"A\" { }",
            &mut diag,
        )
        .unwrap();
        assert_eq!(scapes.len(), 1);
        assert_eq!(scapes[0].name, "A");
        assert_eq!(scapes[0].dsp, 0);
        assert_eq!(scapes[0].dsp_volume, 1.0);
        assert!(scapes[0].rules.is_empty());
    }

    #[test]
    fn test_manifest() {
        let manifest =
            parse_soundscape_manifest("soundscapes_manifest { file scripts/soundscapes_canals.txt }")
                .unwrap();
        assert_eq!(manifest.files, vec!["scripts/soundscapes_canals.txt"]);
    }
}
