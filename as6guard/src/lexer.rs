//! Minimal lexical scanner for Structured Text and C-family sources.
//!
//! The scanner exists so that identifier matching never fires inside
//! comments or string literals. It emits identifier, number and symbol
//! tokens with byte offsets and line/column positions; comments and string
//! contents are consumed silently.

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `//` line comments, `(* *)` block comments, `'`/`"` strings with
    /// `$` as the escape character.
    StructuredText,
    /// `//` and `/* */` comments, `"` strings and `'` char literals with
    /// backslash escapes.
    CFamily,
}

impl CommentStyle {
    pub fn for_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("c") | Some("cpp") | Some("hpp") | Some("h") => CommentStyle::CFamily,
            _ => CommentStyle::StructuredText,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    style: CommentStyle,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, style: CommentStyle) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            style,
        }
    }

    /// Tokenize the whole input. Comments and strings are skipped, so every
    /// returned token lives in live code.
    pub fn tokens(mut self) -> Vec<Token<'a>> {
        let mut out = Vec::new();
        while let Some(tok) = self.next_token() {
            out.push(tok);
        }
        out
    }

    fn next_token(&mut self) -> Option<Token<'a>> {
        loop {
            self.skip_insignificant();
            let start = self.pos;
            let line = self.line;
            let column = self.column;
            let b = *self.bytes.get(self.pos)?;

            if b == b'_' || b.is_ascii_alphabetic() {
                while self
                    .bytes
                    .get(self.pos)
                    .is_some_and(|&c| c == b'_' || c.is_ascii_alphanumeric())
                {
                    self.advance();
                }
                return Some(Token {
                    kind: TokenKind::Ident,
                    text: &self.src[start..self.pos],
                    start,
                    end: self.pos,
                    line,
                    column,
                });
            }

            if b.is_ascii_digit() {
                while self
                    .bytes
                    .get(self.pos)
                    .is_some_and(|&c| c.is_ascii_alphanumeric() || c == b'.' || c == b'#')
                {
                    // IEC literals like 16#FF or T#5s keep their tail glued on.
                    self.advance();
                }
                return Some(Token {
                    kind: TokenKind::Number,
                    text: &self.src[start..self.pos],
                    start,
                    end: self.pos,
                    line,
                    column,
                });
            }

            self.advance();
            return Some(Token {
                kind: TokenKind::Symbol,
                text: &self.src[start..self.pos],
                start,
                end: self.pos,
                line,
                column,
            });
        }
    }

    /// Skip whitespace, comments and string literals.
    fn skip_insignificant(&mut self) {
        loop {
            match self.bytes.get(self.pos) {
                Some(b) if b.is_ascii_whitespace() => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => self.skip_line_comment(),
                Some(b'/')
                    if self.style == CommentStyle::CFamily && self.peek_at(1) == Some(b'*') =>
                {
                    self.skip_block_comment(b"/*", b"*/")
                }
                Some(b'(')
                    if self.style == CommentStyle::StructuredText
                        && self.peek_at(1) == Some(b'*') =>
                {
                    self.skip_block_comment(b"(*", b"*)")
                }
                Some(b'\'') => {
                    let escape = match self.style {
                        CommentStyle::StructuredText => b'$',
                        CommentStyle::CFamily => b'\\',
                    };
                    self.skip_string(b'\'', escape);
                }
                Some(b'"') => {
                    let escape = match self.style {
                        CommentStyle::StructuredText => b'$',
                        CommentStyle::CFamily => b'\\',
                    };
                    self.skip_string(b'"', escape);
                }
                _ => return,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == b'\n' {
                return;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self, open: &[u8], close: &[u8]) {
        self.advance(); // first open byte
        self.advance(); // second open byte
        debug_assert_eq!(open.len(), 2);
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == close[0] && self.peek_at(1) == Some(close[1]) {
                self.advance();
                self.advance();
                return;
            }
            self.advance();
        }
        // Unterminated comment swallows the rest of the file.
    }

    fn skip_string(&mut self, quote: u8, escape: u8) {
        self.advance(); // opening quote
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == escape {
                self.advance();
                if self.pos < self.bytes.len() {
                    self.advance();
                }
                continue;
            }
            if b == quote {
                self.advance();
                return;
            }
            if b == b'\n' {
                // Strings don't span lines in either grammar; bail so a
                // missing quote can't hide the rest of the file.
                return;
            }
            self.advance();
        }
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(&b) = self.bytes.get(self.pos) {
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += 1;
        }
    }
}
