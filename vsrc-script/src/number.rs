//! Numeric script fields
//!
//! A field holds a number, a symbolic name such as `PITCH_NORM`, or a
//! `min,max` pair of either. Text that is neither reads as its leading
//! decimal number, or 0.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange<T> {
    pub min: T,
    pub max: T,
}

impl<T: Copy> ValueRange<T> {
    pub fn fixed(value: T) -> Self {
        Self {
            min: value,
            max: value,
        }
    }
}

/// Numbers a script field can hold
pub trait ScriptNumber: Copy {
    fn from_f32(value: f32) -> Self;
}

impl ScriptNumber for f32 {
    fn from_f32(value: f32) -> Self {
        value
    }
}

impl ScriptNumber for u8 {
    /// Saturates into 0..=255
    fn from_f32(value: f32) -> Self {
        value as u8
    }
}

pub const CHANNEL_NAMES: &[(&str, u8)] = &[
    ("CHAN_AUTO", 0),
    ("CHAN_WEAPON", 1),
    ("CHAN_VOICE", 2),
    ("CHAN_VOICE2", 3),
    ("CHAN_ITEM", 4),
    ("CHAN_BODY", 5),
    ("CHAN_STREAM", 6),
    ("CHAN_REPLACE", 7),
    ("CHAN_STATIC", 8),
    ("CHAN_VOICE_BASE", 9),
    ("CHAN_USER_BASE", 10),
];

pub const VOLUME_NAMES: &[(&str, f32)] = &[("VOL_NORM", 1.0)];

pub const PITCH_NAMES: &[(&str, u8)] = &[
    ("PITCH_LOW", 95),
    ("PITCH_NORM", 100),
    ("PITCH_HIGH", 120),
];

/// Attenuation presets in dB
pub const SOUND_LEVEL_NAMES: &[(&str, u8)] = &[
    ("SNDLVL_NONE", 0),
    ("SNDLVL_20dB", 20),
    ("SNDLVL_25dB", 25),
    ("SNDLVL_30dB", 30),
    ("SNDLVL_35dB", 35),
    ("SNDLVL_40dB", 40),
    ("SNDLVL_45dB", 45),
    ("SNDLVL_50dB", 50),
    ("SNDLVL_55dB", 55),
    ("SNDLVL_IDLE", 60),
    ("SNDLVL_60dB", 60),
    ("SNDLVL_65dB", 65),
    ("SNDLVL_STATIC", 65),
    ("SNDLVL_70dB", 70),
    ("SNDLVL_75dB", 75),
    ("SNDLVL_NORM", 75),
    ("SNDLVL_80dB", 80),
    ("SNDLVL_TALKING", 80),
    ("SNDLVL_85dB", 85),
    ("SNDLVL_90dB", 90),
    ("SNDLVL_95dB", 95),
    ("SNDLVL_100dB", 100),
    ("SNDLVL_105dB", 105),
    ("SNDLVL_110dB", 110),
    ("SNDLVL_120dB", 120),
    ("SNDLVL_125dB", 125),
    ("SNDLVL_130dB", 130),
    ("SNDLVL_GUNFIRE", 135),
    ("SNDLVL_140dB", 140),
    ("SNDLVL_145dB", 145),
    ("SNDLVL_150dB", 150),
    ("SNDLVL_180dB", 180),
];

fn lookup<T: Copy>(names: &[(&str, T)], text: &str) -> Option<T> {
    names
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(text))
        .map(|&(_, value)| value)
}

/// Leading decimal number of `text`, or 0 when there is none
pub fn leading_number(text: &str) -> f32 {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text[..end].parse().unwrap_or(0.0)
}

/// One number or symbolic name
pub fn parse_value<T: ScriptNumber>(text: &str, names: &[(&str, T)]) -> T {
    let text = text.trim();
    lookup(names, text).unwrap_or_else(|| T::from_f32(leading_number(text)))
}

/// `value` or `min,max`. Missing or empty text gives `default` for both ends.
pub fn parse_range<T: ScriptNumber>(
    text: Option<&str>,
    names: &[(&str, T)],
    default: T,
) -> ValueRange<T> {
    let text = match text {
        Some(text) => text,
        None => return ValueRange::fixed(default),
    };
    let mut values = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_value(s, names));
    match (values.next(), values.next()) {
        (Some(min), Some(max)) => ValueRange { min, max },
        (Some(value), None) => ValueRange::fixed(value),
        _ => ValueRange::fixed(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("0.7"), 0.7);
        assert_eq!(leading_number(" -3 "), -3.0);
        assert_eq!(leading_number("90dB"), 90.0);
        assert_eq!(leading_number("loud"), 0.0);
        assert_eq!(leading_number(""), 0.0);
    }

    #[test]
    fn test_volume_range() {
        let range = parse_range(Some("0.4,0.7"), VOLUME_NAMES, 1.0);
        assert_eq!(range, ValueRange { min: 0.4, max: 0.7 });
        assert_eq!(parse_range(Some("VOL_NORM"), VOLUME_NAMES, 0.5), ValueRange::fixed(1.0));
        assert_eq!(parse_range(None, VOLUME_NAMES, 1.0), ValueRange::fixed(1.0));
        assert_eq!(parse_range(Some(" , "), VOLUME_NAMES, 1.0), ValueRange::fixed(1.0));
    }

    #[test]
    fn test_named_levels() {
        assert_eq!(parse_value("CHAN_WEAPON", CHANNEL_NAMES), 1);
        assert_eq!(parse_value("chan_static", CHANNEL_NAMES), 8);
        assert_eq!(parse_value("6", CHANNEL_NAMES), 6);
        assert_eq!(
            parse_range(Some("SNDLVL_90dB"), SOUND_LEVEL_NAMES, 75),
            ValueRange::fixed(90)
        );
        assert_eq!(
            parse_range(Some("PITCH_LOW, PITCH_HIGH"), PITCH_NAMES, 100),
            ValueRange { min: 95, max: 120 }
        );
        assert_eq!(parse_value::<u8>("300", PITCH_NAMES), 255);
    }
}
