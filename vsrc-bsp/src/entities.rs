//! Entity lump parser
//!
//! The lump is plain text: a sequence of `{ "key" "value" ... }` blocks.
//! Keys may repeat (outputs such as `OnTrigger`), so properties are kept as
//! an ordered list rather than a map.

use glam::Vec3;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Entity {
    pub properties: Vec<(String, String)>,
}

impl Entity {
    /// First value for `key`, case-insensitive
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.properties
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn classname(&self) -> &str {
        self.get("classname").unwrap_or("")
    }

    pub fn targetname(&self) -> Option<&str> {
        self.get("targetname")
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.get(key)?.trim().parse().ok()
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        let value = self.get(key)?.trim();
        value
            .parse::<i32>()
            .ok()
            .or_else(|| value.parse::<f32>().ok().map(|f| f as i32))
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)?.trim() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            other => other.parse::<f32>().ok().map(|f| f != 0.0),
        }
    }

    /// Whitespace-separated triple, e.g. `origin` or `angles`
    pub fn get_vec3(&self, key: &str) -> Option<Vec3> {
        parse_vec3(self.get(key)?)
    }

    pub fn origin(&self) -> Vec3 {
        self.get_vec3("origin").unwrap_or(Vec3::ZERO)
    }

    /// Pitch, yaw, roll in degrees
    pub fn angles(&self) -> Vec3 {
        self.get_vec3("angles").unwrap_or(Vec3::ZERO)
    }

    /// Brush model this entity owns (`model "*3"`)
    pub fn brush_model(&self) -> Option<usize> {
        self.get("model")?.strip_prefix('*')?.parse().ok()
    }
}

pub fn parse_vec3(value: &str) -> Option<Vec3> {
    let mut parts = value.split_whitespace().map(|p| p.parse::<f32>());
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    let z = parts.next()?.ok()?;
    Some(Vec3::new(x, y, z))
}

/// Parse the entity lump. Malformed trailing text is ignored; an unterminated
/// block is kept with whatever properties were read.
pub fn parse_entities(text: &str) -> Vec<Entity> {
    let mut entities = Vec::new();
    let mut tokens = Tokens::new(text);
    while let Some(token) = tokens.next() {
        if token != Token::Open {
            continue;
        }
        let mut entity = Entity::default();
        loop {
            match tokens.next() {
                Some(Token::Str(key)) => match tokens.next() {
                    Some(Token::Str(value)) => entity.properties.push((key, value)),
                    Some(Token::Close) | None => break,
                    Some(Token::Open) => break,
                },
                Some(Token::Close) | None => break,
                Some(Token::Open) => break,
            }
        }
        entities.push(entity);
    }
    entities
}

#[derive(Debug, PartialEq)]
enum Token {
    Open,
    Close,
    Str(String),
}

struct Tokens<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
        }
    }
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let c = *self.chars.peek()?;
            if c.is_whitespace() || c == '\0' {
                self.chars.next();
            } else if c == '/' {
                self.chars.next();
                if self.chars.peek() == Some(&'/') {
                    for c in self.chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
            } else {
                break;
            }
        }
        match self.chars.next()? {
            '{' => Some(Token::Open),
            '}' => Some(Token::Close),
            '"' => {
                let mut s = String::new();
                for c in self.chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    s.push(c);
                }
                Some(Token::Str(s))
            }
            first => {
                let mut s = String::from(first);
                while let Some(&c) = self.chars.peek() {
                    if c.is_whitespace() || c == '{' || c == '}' || c == '"' {
                        break;
                    }
                    s.push(c);
                    self.chars.next();
                }
                Some(Token::Str(s))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LUMP: &str = r#"{
"world_maxs" "1024 1024 512"
"classname" "worldspawn"
"skyname" "sky_day01_01"
}
{
"origin" "128 -64 32"
"angles" "0 90 0"
"classname" "info_player_start"
}
{
"model" "*2"
"classname" "func_door"
"OnOpen" "relay,Trigger,,0,-1"
"OnOpen" "lamp,TurnOn,,0,-1"
"spawnflags" "256"
}
"#;

    #[test]
    fn test_parse_blocks() {
        let ents = parse_entities(LUMP);
        assert_eq!(ents.len(), 3);
        assert_eq!(ents[0].classname(), "worldspawn");
        assert_eq!(ents[0].get("SKYNAME"), Some("sky_day01_01"));
        assert_eq!(ents[1].origin(), Vec3::new(128.0, -64.0, 32.0));
        assert_eq!(ents[1].angles(), Vec3::new(0.0, 90.0, 0.0));
        assert_eq!(ents[2].brush_model(), Some(2));
        assert_eq!(ents[2].get_all("OnOpen").count(), 2);
        assert_eq!(ents[2].get_i32("spawnflags"), Some(256));
    }

    #[test]
    fn test_tolerates_nul_and_truncation() {
        let ents = parse_entities("{ \"classname\" \"light\" }\0\0{ \"a\" ");
        assert_eq!(ents.len(), 2);
        assert_eq!(ents[0].classname(), "light");
        assert!(ents[1].properties.is_empty());
    }

    #[test]
    fn test_typed_getters() {
        let e = Entity {
            properties: vec![
                ("enabled".into(), "1".into()),
                ("scale".into(), "0.5".into()),
                ("bad".into(), "x y".into()),
            ],
        };
        assert_eq!(e.get_bool("enabled"), Some(true));
        assert_eq!(e.get_f32("scale"), Some(0.5));
        assert_eq!(e.get_vec3("bad"), None);
        assert_eq!(e.get_i32("missing"), None);
    }
}
