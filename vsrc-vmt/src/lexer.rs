//! KeyValues tokenizer
//!
//! Tokens are quoted strings, bare words, braces, and `[$PLATFORM]` style
//! conditions. `//` starts a comment that runs to the end of the line.

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Open,
    Close,
    Str(String),
    /// Body of a trailing `[...]` condition, brackets stripped
    Condition(String),
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Open => "'{'".to_string(),
            Token::Close => "'}'".to_string(),
            Token::Str(s) => format!("\"{}\"", s),
            Token::Condition(c) => format!("[{}]", c),
        }
    }
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Self {
        // UTF-8 byte order mark
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Self {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || c == '\0' {
                self.bump();
            } else if c == '/' {
                let mut ahead = self.chars.clone();
                ahead.next();
                if ahead.peek() != Some(&'/') {
                    return;
                }
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                return;
            }
        }
    }

    fn delimited(&mut self, close: char) -> String {
        let mut s = String::new();
        while let Some(c) = self.bump() {
            if c == close {
                break;
            }
            s.push(c);
        }
        s
    }
}

impl Iterator for Lexer<'_> {
    type Item = (usize, Token);

    fn next(&mut self) -> Option<(usize, Token)> {
        self.skip_trivia();
        let line = self.line;
        let token = match self.bump()? {
            '{' => Token::Open,
            '}' => Token::Close,
            '"' => Token::Str(self.delimited('"')),
            '[' => Token::Condition(self.delimited(']').trim().to_string()),
            first => {
                let mut s = String::from(first);
                while let Some(&c) = self.chars.peek() {
                    if c.is_whitespace() || matches!(c, '{' | '}' | '"') {
                        break;
                    }
                    s.push(c);
                    self.bump();
                }
                Token::Str(s)
            }
        };
        Some((line, token))
    }
}
