//! Sound scripts
//!
//! ```text
//! "Weapon_Pistol.Single"
//! {
//!     "channel"    "CHAN_WEAPON"
//!     "volume"     "0.55,0.7"
//!     "soundlevel" "SNDLVL_GUNFIRE"
//!     "pitch"      "PITCH_NORM"
//!     "rndwave"
//!     {
//!         "wave" ")weapons/pistol/pistol_fire2.wav"
//!         "wave" ")weapons/pistol/pistol_fire3.wav"
//!     }
//! }
//! ```
//!
//! A script file holds any number of entries. The manifest
//! (`game_sounds_manifest`) lists the script files of a game.

use serde::Serialize;
use vsrc_common::Diagnostics;
use vsrc_vmt::{KeyValues, Node, parse_keyvalues_document};

use crate::error::ScriptError;
use crate::number::{
    CHANNEL_NAMES, PITCH_NAMES, SOUND_LEVEL_NAMES, VOLUME_NAMES, ValueRange, parse_range,
    parse_value,
};
use crate::{Manifest, active_entries};

pub const SOUND_MANIFEST_ROOT: &str = "game_sounds_manifest";
/// Manifest keys naming script files
pub const SOUND_MANIFEST_KEYS: &[&str] = &["precache_file", "preload_file"];

pub const DEFAULT_VOLUME: f32 = 1.0;
pub const DEFAULT_PITCH: u8 = 100;
pub const DEFAULT_SOUND_LEVEL: u8 = 75;

/// Playback hint carried by a leading character of a wave path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveFlag {
    Stream,
    DryMix,
    Omni,
    Doppler,
    Directional,
    DistVariant,
    SpatialStereo,
    FastPitch,
    Critical,
    Sentence,
    UserVox,
    HrtfForce,
    Hrtf,
    HrtfBlend,
    Radio,
    DirStereo,
    Music,
}

impl WaveFlag {
    pub fn from_char(c: char) -> Option<Self> {
        use WaveFlag::*;
        Some(match c {
            '*' => Stream,
            '#' => DryMix,
            '@' => Omni,
            '>' => Doppler,
            '<' => Directional,
            '^' => DistVariant,
            ')' => SpatialStereo,
            '}' => FastPitch,
            '$' => Critical,
            '!' => Sentence,
            '?' => UserVox,
            '&' => HrtfForce,
            '~' => Hrtf,
            '\'' => HrtfBlend,
            '+' => Radio,
            '(' => DirStereo,
            '%' => Music,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wave {
    /// Relative to `sound/`, `/` separated
    pub path: String,
    pub flags: Vec<WaveFlag>,
}

/// Split the flag prefix off a wave path. `None` when no path remains.
pub fn parse_wave(text: &str) -> Option<Wave> {
    let text = text.trim();
    let mut flags = Vec::new();
    let mut path = text;
    for (i, c) in text.char_indices() {
        match WaveFlag::from_char(c) {
            Some(flag) => flags.push(flag),
            None => {
                path = &text[i..];
                break;
            }
        }
        path = &text[i + c.len_utf8()..];
    }
    if path.is_empty() {
        return None;
    }
    Some(Wave {
        path: path.replace('\\', "/"),
        flags,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoundEntry {
    pub name: String,
    pub channel: u8,
    pub volume: ValueRange<f32>,
    pub pitch: ValueRange<u8>,
    pub sound_level: ValueRange<u8>,
    /// One is picked at random on playback when there are several
    pub waves: Vec<Wave>,
}

/// Read the playback fields of one entry. Soundscape rules share this shape.
pub fn parse_sound_entry(name: &str, body: &KeyValues, diag: &mut Diagnostics) -> SoundEntry {
    let channel = body
        .value("channel")
        .map(|v| parse_value(v, CHANNEL_NAMES))
        .unwrap_or(0);

    let wave_texts: Vec<&str> = match body.group("rndwave") {
        Some(group) => active_entries(group)
            .filter(|e| e.key.eq_ignore_ascii_case("wave"))
            .filter_map(|e| match &e.node {
                Node::Value(v) => Some(v.as_str()),
                Node::Group(_) => None,
            })
            .collect(),
        None => body.value("wave").into_iter().collect(),
    };
    let mut waves = Vec::with_capacity(wave_texts.len());
    for text in wave_texts {
        match parse_wave(text) {
            Some(wave) => waves.push(wave),
            None => diag.skipped(format!("sound '{}' wave '{}'", name, text), "empty path"),
        }
    }

    SoundEntry {
        name: name.to_string(),
        channel,
        volume: parse_range(body.value("volume"), VOLUME_NAMES, DEFAULT_VOLUME),
        pitch: parse_range(body.value("pitch"), PITCH_NAMES, DEFAULT_PITCH),
        sound_level: parse_range(body.value("soundlevel"), SOUND_LEVEL_NAMES, DEFAULT_SOUND_LEVEL),
        waves,
    }
}

/// Entries of one or more script files, unique by name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SoundScript {
    pub entries: Vec<SoundEntry>,
}

impl SoundScript {
    pub fn from_keyvalues(doc: &KeyValues, diag: &mut Diagnostics) -> Self {
        let mut script = SoundScript::default();
        for entry in active_entries(doc) {
            match &entry.node {
                Node::Group(body) => script.insert(parse_sound_entry(&entry.key, body, diag)),
                Node::Value(_) => diag.skipped(format!("sound '{}'", entry.key), "not a block"),
            }
        }
        script
    }

    /// Name lookup, case-insensitive
    pub fn get(&self, name: &str) -> Option<&SoundEntry> {
        self.entries.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Add an entry. One with the same name is replaced in place.
    pub fn insert(&mut self, entry: SoundEntry) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(&entry.name))
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Fold a later script in; its entries win
    pub fn merge(&mut self, other: SoundScript) {
        for entry in other.entries {
            self.insert(entry);
        }
    }
}

pub fn parse_sound_script(text: &str, diag: &mut Diagnostics) -> Result<SoundScript, ScriptError> {
    let doc = parse_keyvalues_document(text)?;
    Ok(SoundScript::from_keyvalues(&doc, diag))
}

/// Script files listed by a `game_sounds_manifest`
pub fn parse_sound_manifest(text: &str) -> Result<Manifest, ScriptError> {
    let doc = parse_keyvalues_document(text)?;
    Manifest::from_keyvalues(&doc, SOUND_MANIFEST_ROOT, SOUND_MANIFEST_KEYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PISTOL: &str = r##"
        "Weapon_Pistol.Single"
        {
            "channel"    "CHAN_WEAPON"
            "volume"     "0.4,0.7"
            "soundlevel" "SNDLVL_90dB"
            "pitch"      "98,102"
            "rndwave"
            {
                "wave" ")weapons\pistol\pistol_fire2.wav"
                "wave" "#)weapons/pistol/pistol_fire3.wav"
                "wave" "*"
            }
        }
        "Weapon_Pistol.Empty"
        {
            "wave" "weapons/pistol/pistol_empty.wav"
        }
    "##;

    #[test]
    fn test_entry_fields() {
        let mut diag = Diagnostics::new();
        let script = parse_sound_script(PISTOL, &mut diag).unwrap();
        assert_eq!(script.entries.len(), 2);

        let fire = script.get("weapon_pistol.single").unwrap();
        assert_eq!(fire.channel, 1);
        assert_eq!(fire.volume, ValueRange { min: 0.4, max: 0.7 });
        assert_eq!(fire.sound_level, ValueRange::fixed(90));
        assert_eq!(fire.pitch, ValueRange { min: 98, max: 102 });
        assert_eq!(fire.waves.len(), 2);
        assert_eq!(fire.waves[0].path, "weapons/pistol/pistol_fire2.wav");
        assert_eq!(fire.waves[0].flags, vec![WaveFlag::SpatialStereo]);
        assert_eq!(fire.waves[1].flags, vec![WaveFlag::DryMix, WaveFlag::SpatialStereo]);
        // the bare "*" wave
        assert_eq!(diag.len(), 1);

        let empty = script.get("Weapon_Pistol.Empty").unwrap();
        assert_eq!(empty.channel, 0);
        assert_eq!(empty.volume, ValueRange::fixed(DEFAULT_VOLUME));
        assert_eq!(empty.pitch, ValueRange::fixed(DEFAULT_PITCH));
        assert_eq!(empty.sound_level, ValueRange::fixed(DEFAULT_SOUND_LEVEL));
        assert!(empty.waves[0].flags.is_empty());
    }

    #[test]
    fn test_later_script_wins() {
        let mut diag = Diagnostics::new();
        let mut script = parse_sound_script(PISTOL, &mut diag).unwrap();
        let patch = parse_sound_script(
            "\"WEAPON_PISTOL.EMPTY\" { \"wave\" \"weapons/click.wav\" }",
            &mut diag,
        )
        .unwrap();
        script.merge(patch);
        assert_eq!(script.entries.len(), 2);
        assert_eq!(script.entries[1].waves[0].path, "weapons/click.wav");
    }

    #[test]
    fn test_manifest_lists_files() {
        let manifest = parse_sound_manifest(
            r#"
            "game_sounds_manifest"
            {
                "precache_file" "scripts/game_sounds.txt"
                "preload_file"  "scripts\game_sounds_world.txt"
                "comment"       "ignored"
            }
            "#,
        )
        .unwrap();
        assert_eq!(
            manifest.files,
            vec!["scripts/game_sounds.txt", "scripts/game_sounds_world.txt"]
        );
        assert_eq!(
            parse_sound_manifest("\"x\" { }"),
            Err(ScriptError::MissingBlock(SOUND_MANIFEST_ROOT))
        );
    }

    #[test]
    fn test_serializes_ranges() {
        let mut diag = Diagnostics::new();
        let script = parse_sound_script(PISTOL, &mut diag).unwrap();
        let json = serde_json::to_value(&script).unwrap();
        assert_eq!(json["entries"][0]["sound_level"]["min"], 90);
        assert_eq!(json["entries"][0]["waves"][0]["flags"][0], "spatial_stereo");
    }
}
