//! Typed parameter values
//!
//! Scripts store everything as text. Values are classified once at parse
//! time; the raw text is kept so texture paths that happen to look numeric
//! still round-trip.

use glam::{Affine2, Vec2, Vec4};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Number(f32),
    /// Missing components are padded: xyz default to 0, w to 1
    Vector([f32; 4]),
    Bool(bool),
    String(String),
}

impl Value {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(v) = parse_vector(trimmed) {
            return Value::Vector(v.to_array());
        }
        if let Ok(n) = trimmed.parse::<f32>() {
            return Value::Number(n);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Vector(v) => Some(v[0]),
            Value::String(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    /// Vectors as-is; a scalar is broadcast to rgb with w = 1
    pub fn as_vec4(&self) -> Option<Vec4> {
        match self {
            Value::Vector(v) => Some(Vec4::from_array(*v)),
            Value::Number(n) => Some(Vec4::new(*n, *n, *n, 1.0)),
            _ => None,
        }
    }
}

/// `[x y z]` as floats, or `{r g b}` as 0-255 integers scaled to 0-1.
/// One to four components are accepted.
pub fn parse_vector(text: &str) -> Option<Vec4> {
    let text = text.trim();
    let (body, scale) = if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        (inner, 1.0)
    } else if let Some(inner) = text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
        (inner, 1.0 / 255.0)
    } else {
        return None;
    };
    let parts: Vec<f32> = body
        .split_whitespace()
        .map(|p| p.parse::<f32>().ok())
        .collect::<Option<_>>()?;
    if parts.is_empty() || parts.len() > 4 {
        return None;
    }
    let mut v = [0.0, 0.0, 0.0, 1.0];
    for (slot, p) in v.iter_mut().zip(&parts) {
        *slot = p * scale;
    }
    Some(Vec4::from_array(v))
}

/// `center cx cy scale sx sy rotate deg translate tx ty`, each clause
/// optional. Returns the 2x3 row-major UV matrix `[a b tx, c d ty]`.
pub fn parse_texture_transform(text: &str) -> Option<[f32; 6]> {
    let mut center = Vec2::splat(0.5);
    let mut scale = Vec2::ONE;
    let mut rotate = 0.0f32;
    let mut translate = Vec2::ZERO;
    let mut matched = false;

    let words: Vec<&str> = text.split_whitespace().collect();
    let mut i = 0;
    let number = |i: usize| words.get(i).and_then(|w| w.parse::<f32>().ok());
    while i < words.len() {
        match words[i].to_ascii_lowercase().as_str() {
            "center" => {
                center = Vec2::new(number(i + 1)?, number(i + 2)?);
                i += 3;
            }
            "scale" => {
                scale = Vec2::new(number(i + 1)?, number(i + 2)?);
                i += 3;
            }
            "rotate" => {
                rotate = number(i + 1)?;
                i += 2;
            }
            "translate" => {
                translate = Vec2::new(number(i + 1)?, number(i + 2)?);
                i += 3;
            }
            _ => return None,
        }
        matched = true;
    }
    if !matched {
        return None;
    }

    let m = Affine2::from_translation(translate)
        * Affine2::from_translation(center)
        * Affine2::from_angle(rotate.to_radians())
        * Affine2::from_scale(scale)
        * Affine2::from_translation(-center);
    let (x, y, t) = (m.matrix2.x_axis, m.matrix2.y_axis, m.translation);
    Some([x.x, y.x, t.x, x.y, y.y, t.y])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(Value::parse("1"), Value::Number(1.0));
        assert_eq!(Value::parse(".25"), Value::Number(0.25));
        assert_eq!(Value::parse("TRUE"), Value::Bool(true));
        assert_eq!(
            Value::parse("[1 0.5 0]"),
            Value::Vector([1.0, 0.5, 0.0, 1.0])
        );
        assert_eq!(
            Value::parse("brick/wall01"),
            Value::String("brick/wall01".into())
        );
    }

    #[test]
    fn test_integer_colour_vector() {
        let v = parse_vector("{255 128 0}").unwrap();
        assert_eq!(v.x, 1.0);
        assert!((v.y - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(v.w, 1.0);
    }

    #[test]
    fn test_malformed_vectors() {
        assert_eq!(parse_vector("[1 a 2]"), None);
        assert_eq!(parse_vector("[]"), None);
        assert_eq!(parse_vector("[1 2 3 4 5]"), None);
        assert_eq!(parse_vector("1 2 3"), None);
    }

    #[test]
    fn test_bool_from_number() {
        assert_eq!(Value::Number(0.0).as_bool(), Some(false));
        assert_eq!(Value::Number(2.0).as_bool(), Some(true));
        assert_eq!(Value::String("x".into()).as_bool(), None);
    }

    #[test]
    fn test_identity_transform() {
        let m = parse_texture_transform("center .5 .5 scale 1 1 rotate 0 translate 0 0").unwrap();
        assert_eq!(m, [1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_scale_about_center() {
        let m = parse_texture_transform("center .5 .5 scale 2 2 rotate 0 translate 0 0").unwrap();
        // the centre stays fixed: 2 * 0.5 + t = 0.5
        assert_eq!(m, [2.0, 0.0, -0.5, 0.0, 2.0, -0.5]);
    }

    #[test]
    fn test_translate_only() {
        let m = parse_texture_transform("translate 0.25 0").unwrap();
        assert_eq!(m, [1.0, 0.0, 0.25, 0.0, 1.0, 0.0]);
        assert_eq!(parse_texture_transform("wobble 1"), None);
        assert_eq!(parse_texture_transform(""), None);
    }
}
