//! KeyValues tree
//!
//! ```text
//! "Root"
//! {
//!     "key"   "value"   [$WIN32]
//!     "group"
//!     {
//!         ...
//!     }
//! }
//! ```
//!
//! Entries keep their source order and their original key spelling.
//! Duplicate keys are kept; callers decide which one wins.

use std::iter::Peekable;

use crate::error::VmtError;
use crate::lexer::{Lexer, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Value(String),
    Group(KeyValues),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub node: Node,
    /// Platform condition such as `$X360` or `!$WIN32`
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyValues {
    pub entries: Vec<Entry>,
}

impl KeyValues {
    /// Last entry with this key, case-insensitive
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.key.eq_ignore_ascii_case(key))
            .map(|e| &e.node)
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            Node::Value(v) => Some(v),
            Node::Group(_) => None,
        }
    }

    pub fn group(&self, key: &str) -> Option<&KeyValues> {
        match self.get(key)? {
            Node::Group(g) => Some(g),
            Node::Value(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// True when a `[...]` platform condition holds on desktop Windows/Linux
/// builds of the engine. Consoles and OSX-only branches are dropped.
pub fn platform_condition_holds(condition: &str) -> bool {
    condition.split("||").any(|clause| {
        clause.split("&&").all(|term| {
            let term = term.trim();
            let (negate, symbol) = match term.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, term),
            };
            let holds = matches!(
                symbol.to_ascii_uppercase().as_str(),
                "$WIN32" | "$WINDOWS" | "$PC"
            );
            holds != negate
        })
    })
}

/// Parse a document into its root key and root group
pub fn parse_keyvalues(text: &str) -> Result<(String, KeyValues), VmtError> {
    let mut parser = Parser {
        lexer: Lexer::new(text).peekable(),
        line: 1,
    };
    let root = match parser.advance() {
        Some(Token::Str(name)) => name,
        Some(other) => return Err(parser.unexpected(other, "root name")),
        None => return Err(VmtError::Empty),
    };
    // A condition may sit between the name and the body
    parser.take_condition();
    match parser.advance() {
        Some(Token::Open) => {}
        Some(other) => return Err(parser.unexpected(other, "'{'")),
        None => return Err(parser.eof("'{'")),
    }
    let body = parser.group()?;
    if let Some((line, _)) = parser.lexer.peek() {
        tracing::debug!("Ignoring trailing content after root block from line {}", line);
    }
    Ok((root, body))
}

/// Parse a file holding any number of top-level entries, as sound scripts
/// and soundscape files do. An empty file gives an empty group.
pub fn parse_keyvalues_document(text: &str) -> Result<KeyValues, VmtError> {
    let mut parser = Parser {
        lexer: Lexer::new(text).peekable(),
        line: 1,
    };
    parser.entries(false)
}

struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
    line: usize,
}

impl Parser<'_> {
    fn advance(&mut self) -> Option<Token> {
        let (line, token) = self.lexer.next()?;
        self.line = line;
        Some(token)
    }

    fn unexpected(&self, found: Token, expected: &'static str) -> VmtError {
        VmtError::UnexpectedToken {
            line: self.line,
            found: found.describe(),
            expected,
        }
    }

    fn eof(&self, expected: &'static str) -> VmtError {
        VmtError::UnexpectedEof {
            line: self.line,
            expected,
        }
    }

    fn take_condition(&mut self) -> Option<String> {
        match self.lexer.peek() {
            Some((_, Token::Condition(_))) => match self.advance() {
                Some(Token::Condition(c)) => Some(c),
                _ => None,
            },
            _ => None,
        }
    }

    fn group(&mut self) -> Result<KeyValues, VmtError> {
        self.entries(true)
    }

    /// Entries up to the closing brace, or to end of input when `nested`
    /// is false
    fn entries(&mut self, nested: bool) -> Result<KeyValues, VmtError> {
        let mut group = KeyValues::default();
        loop {
            let key = match self.advance() {
                Some(Token::Close) if nested => return Ok(group),
                Some(Token::Str(key)) => key,
                Some(other) if nested => return Err(self.unexpected(other, "key or '}'")),
                Some(other) => return Err(self.unexpected(other, "key")),
                None if nested => return Err(self.eof("'}'")),
                None => return Ok(group),
            };

            let mut condition = self.take_condition();
            let node = match self.advance() {
                Some(Token::Str(value)) => Node::Value(value),
                Some(Token::Open) => Node::Group(self.group()?),
                Some(other) => return Err(self.unexpected(other, "value or '{'")),
                None => return Err(self.eof("value")),
            };
            if condition.is_none() {
                condition = self.take_condition();
            }
            group.entries.push(Entry {
                key,
                node,
                condition,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_groups() {
        let (root, body) = parse_keyvalues(
            r#"
            "VertexLitGeneric"
            {
                "$basetexture" "models/props/crate"
                "Proxies"
                {
                    "AnimatedTexture"
                    {
                        "animatedTextureVar" "$basetexture"
                        "animatedTextureFrameRate" 10
                    }
                }
            }
            "#,
        )
        .unwrap();
        assert_eq!(root, "VertexLitGeneric");
        assert_eq!(body.value("$BASETEXTURE"), Some("models/props/crate"));
        let proxies = body.group("proxies").unwrap();
        let anim = proxies.group("AnimatedTexture").unwrap();
        assert_eq!(anim.value("animatedtextureframerate"), Some("10"));
    }

    #[test]
    fn test_last_duplicate_wins() {
        let (_, body) = parse_keyvalues("x { a 1 a 2 }").unwrap();
        assert_eq!(body.len(), 2);
        assert_eq!(body.value("a"), Some("2"));
    }

    #[test]
    fn test_conditions_attach_to_entries() {
        let (_, body) = parse_keyvalues("x { \"$envmap\" \"env_cubemap\" [$X360] b 1 }").unwrap();
        assert_eq!(body.entries[0].condition.as_deref(), Some("$X360"));
        assert_eq!(body.entries[1].condition, None);
    }

    #[test]
    fn test_platform_conditions() {
        assert!(platform_condition_holds("$WIN32"));
        assert!(platform_condition_holds("!$X360"));
        assert!(!platform_condition_holds("$X360"));
        assert!(!platform_condition_holds("$X360 || $PS3"));
        assert!(platform_condition_holds("$X360 || $WINDOWS"));
        assert!(!platform_condition_holds("!$WIN32 && $X360"));
    }

    #[test]
    fn test_unclosed_group() {
        assert!(matches!(
            parse_keyvalues("x { a 1"),
            Err(VmtError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_document_with_many_roots() {
        let doc = parse_keyvalues_document(
            r#"
            // two entries
            "Weapon_Pistol.Single" { "channel" "CHAN_WEAPON" }
            "Weapon_Pistol.Empty"
            {
                "wave" "weapons/pistol/pistol_empty.wav"
            }
            "#,
        )
        .unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.entries[1].key, "Weapon_Pistol.Empty");
        let single = doc.group("weapon_pistol.single").unwrap();
        assert_eq!(single.value("channel"), Some("CHAN_WEAPON"));

        assert!(parse_keyvalues_document("").unwrap().is_empty());
        assert!(matches!(
            parse_keyvalues_document("a { b 1 } }"),
            Err(VmtError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_missing_body() {
        assert!(matches!(
            parse_keyvalues("x a"),
            Err(VmtError::UnexpectedToken { line: 1, .. })
        ));
        assert_eq!(parse_keyvalues("  // nothing\n"), Err(VmtError::Empty));
    }
}
