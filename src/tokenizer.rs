//! Lexer shared by the MD5 and PROC parsers.
//!
//! The id Software text formats are whitespace delimited streams of bare words, quoted strings,
//! numbers and the single character delimiters `( ) { }`. `//` and `/* */` comments may appear
//! between any two tokens.

use glam::{Vec2, Vec3, Vec4};

use crate::error::{Location, ParseError, ParseResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    /// Bare word, quoted string (without the quotes) or delimiter
    String,
    Integer(i64),
    Float(f32),
}

impl Default for TokenKind {
    fn default() -> Self {
        TokenKind::String
    }
}

/// A lexical unit. Numeric values are converted once while lexing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub at: Location,
}

impl<'a> Token<'a> {
    pub fn is_string(&self, value: &str) -> bool {
        self.kind == TokenKind::String && self.text == value
    }

    pub fn is_number(&self) -> bool {
        !matches!(self.kind, TokenKind::String)
    }

    pub fn as_int(&self) -> ParseResult<i64> {
        match self.kind {
            TokenKind::Integer(value) => Ok(value),
            _ => Err(self.malformed("expected an integer")),
        }
    }

    /// Integers are accepted where a float is expected.
    pub fn as_float(&self) -> ParseResult<f32> {
        match self.kind {
            TokenKind::Integer(value) => Ok(value as f32),
            TokenKind::Float(value) => Ok(value),
            TokenKind::String => Err(self.malformed("expected a number")),
        }
    }

    fn malformed(&self, reason: &str) -> ParseError {
        ParseError::MalformedToken {
            text: self.text.to_owned(),
            reason: reason.to_owned(),
            at: self.at,
        }
    }
}

fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'{' | b'}' | b'"')
}

fn looks_numeric(text: &[u8]) -> bool {
    match text {
        [c, ..] if c.is_ascii_digit() => true,
        [b'+' | b'-', c, ..] if c.is_ascii_digit() => true,
        [b'+' | b'-', b'.', c, ..] if c.is_ascii_digit() => true,
        [b'.', c, ..] if c.is_ascii_digit() => true,
        _ => false,
    }
}

/// Cursor over a source text. Cloning it is cheap and is how [`Tokenizer::peek`] looks ahead.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
        }
    }

    pub fn location(&self) -> Location {
        Location {
            line: self.line,
            offset: self.pos,
        }
    }

    fn bytes(&self) -> &'a [u8] {
        self.source.as_bytes()
    }

    fn advance_to(&mut self, end: usize) {
        let skipped = &self.bytes()[self.pos..end];
        self.line += skipped.iter().filter(|&&c| c == b'\n').count();
        self.pos = end;
    }

    fn skip_whitespace_and_comments(&mut self) -> ParseResult<()> {
        let bytes = self.bytes();
        loop {
            let mut end = self.pos;
            while end < bytes.len() && bytes[end].is_ascii_whitespace() {
                end += 1;
            }
            self.advance_to(end);

            let rest = &bytes[self.pos..];
            if rest.starts_with(b"//") {
                let end = rest
                    .iter()
                    .position(|&c| c == b'\n')
                    .map_or(bytes.len(), |n| self.pos + n);
                self.advance_to(end);
            } else if rest.starts_with(b"/*") {
                let at = self.location();
                let close = self.source[self.pos + 2..].find("*/").ok_or_else(|| {
                    ParseError::MalformedToken {
                        text: "/*".to_owned(),
                        reason: "unterminated block comment".to_owned(),
                        at,
                    }
                })?;
                self.advance_to(self.pos + 2 + close + 2);
            } else {
                return Ok(());
            }
        }
    }

    fn lex(&mut self) -> ParseResult<Option<Token<'a>>> {
        self.skip_whitespace_and_comments()?;

        let bytes = self.bytes();
        if self.pos >= bytes.len() {
            return Ok(None);
        }

        let start = self.pos;
        let at = self.location();

        match bytes[start] {
            b'"' => {
                let close = self.source[start + 1..].find('"').ok_or_else(|| {
                    ParseError::MalformedToken {
                        text: self.source[start..].lines().next().unwrap_or("").to_owned(),
                        reason: "unterminated quoted string".to_owned(),
                        at,
                    }
                })?;
                let end = start + 1 + close;
                self.advance_to(end + 1);
                Ok(Some(Token {
                    kind: TokenKind::String,
                    text: &self.source[start + 1..end],
                    at,
                }))
            }
            b'(' | b')' | b'{' | b'}' => {
                self.pos += 1;
                Ok(Some(Token {
                    kind: TokenKind::String,
                    text: &self.source[start..start + 1],
                    at,
                }))
            }
            _ => {
                let mut end = start;
                while end < bytes.len() && !bytes[end].is_ascii_whitespace() && !is_delimiter(bytes[end]) {
                    end += 1;
                }
                self.pos = end;
                let text = &self.source[start..end];
                let kind = Self::classify(text, at)?;
                Ok(Some(Token { kind, text, at }))
            }
        }
    }

    fn classify(text: &str, at: Location) -> ParseResult<TokenKind> {
        if !looks_numeric(text.as_bytes()) {
            return Ok(TokenKind::String);
        }

        let malformed = |reason: &str| ParseError::MalformedToken {
            text: text.to_owned(),
            reason: reason.to_owned(),
            at,
        };

        if text.contains(|c| matches!(c, '.' | 'e' | 'E')) {
            text.parse()
                .map(TokenKind::Float)
                .map_err(|_| malformed("invalid floating point number"))
        } else {
            text.parse()
                .map(TokenKind::Integer)
                .map_err(|_| malformed("invalid integer"))
        }
    }

    /// Fills `token` with the next token, overwriting its previous contents.
    ///
    /// Returns `Ok(false)` once the input is exhausted.
    pub fn next_into(&mut self, token: &mut Token<'a>) -> ParseResult<bool> {
        match self.lex()? {
            Some(next) => {
                *token = next;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn next_token(&mut self) -> ParseResult<Option<Token<'a>>> {
        self.lex()
    }

    /// Returns the next token without consuming it.
    pub fn peek(&self) -> ParseResult<Option<Token<'a>>> {
        self.clone().lex()
    }

    /// Next token, failing with [`ParseError::UnexpectedEndOfInput`] when there is none.
    pub fn expect_token(&mut self, expected: &str) -> ParseResult<Token<'a>> {
        let at = self.location();
        self.lex()?.ok_or_else(|| ParseError::UnexpectedEndOfInput {
            expected: expected.to_owned(),
            at,
        })
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> ParseResult<()> {
        let token = self.expect_token(&format!("`{}`", keyword))?;
        if token.is_string(keyword) {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                expected: format!("`{}`", keyword),
                found: token.text.to_owned(),
                at: token.at,
            })
        }
    }

    pub fn expect_string(&mut self, what: &str) -> ParseResult<&'a str> {
        // numeric names such as a bare `0` are legal, so the kind is not checked
        Ok(self.expect_token(what)?.text)
    }

    pub fn expect_int(&mut self, what: &str) -> ParseResult<i64> {
        self.expect_token(what)?.as_int()
    }

    /// Reads a non-negative integer used as an element count.
    pub fn expect_count(&mut self, what: &str) -> ParseResult<usize> {
        let token = self.expect_token(what)?;
        let value = token.as_int()?;
        usize::try_from(value)
            .map_err(|_| ParseError::mismatch(format!("{} must not be negative, found {}", what, value), token.at))
    }

    pub fn expect_float(&mut self, what: &str) -> ParseResult<f32> {
        self.expect_token(what)?.as_float()
    }

    pub fn expect_vec2(&mut self, what: &str) -> ParseResult<Vec2> {
        Ok(Vec2::new(self.expect_float(what)?, self.expect_float(what)?))
    }

    pub fn expect_vec3(&mut self, what: &str) -> ParseResult<Vec3> {
        Ok(Vec3::new(
            self.expect_float(what)?,
            self.expect_float(what)?,
            self.expect_float(what)?,
        ))
    }

    /// Reads `( x y z )`.
    pub fn expect_paren_vec3(&mut self, what: &str) -> ParseResult<Vec3> {
        self.expect_keyword("(")?;
        let v = self.expect_vec3(what)?;
        self.expect_keyword(")")?;
        Ok(v)
    }

    /// Reads `( a b c d )`.
    pub fn expect_paren_vec4(&mut self, what: &str) -> ParseResult<Vec4> {
        self.expect_keyword("(")?;
        let v = Vec4::new(
            self.expect_float(what)?,
            self.expect_float(what)?,
            self.expect_float(what)?,
            self.expect_float(what)?,
        );
        self.expect_keyword(")")?;
        Ok(v)
    }

    /// Skips a `{ ... }` block including nested blocks. The opening brace must be the next token.
    pub fn skip_block(&mut self) -> ParseResult<()> {
        self.expect_keyword("{")?;
        let mut depth = 1usize;
        while depth > 0 {
            let token = self.expect_token("`}`")?;
            if token.is_string("{") {
                depth += 1;
            } else if token.is_string("}") {
                depth -= 1;
            }
        }
        Ok(())
    }
}
