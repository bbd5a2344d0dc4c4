//! Layout-aware lexer for Nelmo.
//!
//! Tokens are produced on demand. Line breaks are not tokens by
//! themselves: the off-side rule decides whether the next line
//! continues the current expression (it is indented further) or ends
//! it, in which case an `EndOfExpression` token is synthesized.

use crate::error::CoreError;
use crate::span::Span;

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Integer,
    Float,
    String,
    /// Runs of operator characters: `+`, `->`, `==`, `\`, `.`, ...
    Symbol,
    /// One of `[ ] , ( )`.
    Delimiter,
    /// Synthesized by the layout rule.
    EndOfExpression,
}

/// A single token with its kind, text and span.
///
/// For strings `value` holds the contents without the quotes. For an
/// `EndOfExpression` it holds the line break that closed the expression,
/// or nothing when the token was produced at end of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub span: Span,
}

impl Token {
    pub fn is(&self, kind: TokenKind, value: &str) -> bool {
        self.kind == kind && self.value == value
    }
}

const DELIMITERS: &[u8] = b"[],()\"";

pub struct Lexer<'src> {
    source: &'src str,
    chars: &'src [u8],
    len: usize,
    index: usize,
    /// Indentation widths of the open continuation lines.
    indents: Vec<usize>,
    /// Tokens handed back by the parser, returned before lexing resumes.
    pending: Vec<Token>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer {
            source,
            chars: source.as_bytes(),
            len: source.len(),
            index: 0,
            indents: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Returns the next token, or `None` once the input and every open
    /// indentation level are exhausted.
    pub fn next_token(&mut self) -> Result<Option<Token>, CoreError> {
        if let Some(token) = self.pending.pop() {
            return Ok(Some(token));
        }

        self.skip_whitespaces(false);

        let Some(ch) = self.peek_char() else {
            return Ok(self.end_of_input());
        };

        if is_end_of_line(ch) {
            let start = self.index;
            self.consume_char();
            let (indentation, line_start) = self.next_line_indentation();

            let continues = match self.indents.last() {
                None => indentation > 0,
                Some(&top) => top < indentation,
            };

            if !continues {
                self.indents.pop();
                return Ok(Some(self.token(TokenKind::EndOfExpression, start, start + 1)));
            }

            self.indents.push(indentation);
            self.index = line_start;
            return self.next_token();
        }

        self.lex_token(ch).map(Some)
    }

    /// Hands a token back; it is the next one `next_token` returns.
    pub fn push_token(&mut self, token: Token) {
        self.pending.push(token);
    }

    /// Skips blanks and comments. With `include_newlines`, line breaks
    /// are skipped too and pending `EndOfExpression` tokens are dropped.
    pub fn skip_whitespaces(&mut self, include_newlines: bool) {
        if include_newlines {
            while self
                .pending
                .last()
                .is_some_and(|token| token.kind == TokenKind::EndOfExpression)
            {
                self.pending.pop();
            }
        }

        loop {
            while let Some(ch) = self.peek_char() {
                if is_whitespace(ch) || (include_newlines && is_end_of_line(ch)) {
                    self.consume_char();
                } else {
                    break;
                }
            }

            if self.starts_with(b"--") {
                self.skip_line_comment();
                continue;
            }

            if self.starts_with(b"{-") {
                self.skip_block_comment();
                continue;
            }

            break;
        }
    }

    fn end_of_input(&mut self) -> Option<Token> {
        self.indents
            .pop()
            .map(|_| self.token(TokenKind::EndOfExpression, self.len, self.len))
    }

    /// Indentation of the next non-blank line and the byte offset of its
    /// first non-blank character.
    fn next_line_indentation(&self) -> (usize, usize) {
        let mut pos = self.index;
        loop {
            while pos < self.len && is_end_of_line(self.chars[pos]) {
                pos += 1;
            }

            let mut indentation = 0;
            while pos < self.len && is_whitespace(self.chars[pos]) {
                pos += 1;
                indentation += 1;
            }

            if pos < self.len && is_end_of_line(self.chars[pos]) {
                continue;
            }

            return (indentation, pos);
        }
    }

    fn lex_token(&mut self, ch: u8) -> Result<Token, CoreError> {
        let start = self.index;

        if ch == b'"' {
            if self.peek_at(1) == Some(b'"') && self.peek_at(2) == Some(b'"') {
                return self.lex_multiline_string(start);
            }
            return self.lex_string(start);
        }

        if is_letter(ch) {
            return Ok(self.lex_name(start));
        }

        if is_digit(ch) {
            return Ok(self.lex_number(start));
        }

        self.consume_char();

        if is_delimiter(ch) {
            return Ok(self.token(TokenKind::Delimiter, start, self.index));
        }

        while self.peek_char().is_some_and(is_symbol) {
            self.consume_char();
        }
        Ok(self.token(TokenKind::Symbol, start, self.index))
    }

    fn lex_string(&mut self, start: usize) -> Result<Token, CoreError> {
        self.consume_char();
        let content_start = self.index;

        while let Some(ch) = self.peek_char() {
            if ch == b'"' {
                let content_end = self.index;
                self.consume_char();
                return Ok(self.string_token(start, content_start, content_end));
            }
            if is_end_of_line(ch) {
                break;
            }
            self.consume_char();
        }

        Err(self.unclosed_string(start))
    }

    fn lex_multiline_string(&mut self, start: usize) -> Result<Token, CoreError> {
        self.index += 3;
        let content_start = self.index;

        while self.index < self.len {
            if self.starts_with(b"\"\"\"") {
                let content_end = self.index;
                self.index += 3;
                return Ok(self.string_token(start, content_start, content_end));
            }
            self.consume_char();
        }

        Err(self.unclosed_string(start))
    }

    fn lex_name(&mut self, start: usize) -> Token {
        while self.peek_char().is_some_and(is_name_character) {
            self.consume_char();
        }
        self.token(TokenKind::Name, start, self.index)
    }

    fn lex_number(&mut self, start: usize) -> Token {
        while self.peek_char().is_some_and(is_digit) {
            self.consume_char();
        }

        if self.peek_char() == Some(b'.') && self.peek_at(1).is_some_and(is_digit) {
            self.consume_char();
            while self.peek_char().is_some_and(is_digit) {
                self.consume_char();
            }
            return self.token(TokenKind::Float, start, self.index);
        }

        self.token(TokenKind::Integer, start, self.index)
    }

    fn skip_line_comment(&mut self) {
        while self.peek_char().is_some_and(|ch| !is_end_of_line(ch)) {
            self.consume_char();
        }
    }

    // An unterminated comment swallows the rest of the input.
    fn skip_block_comment(&mut self) {
        self.index += 2;
        let mut depth = 1;

        while depth > 0 && self.index < self.len {
            if self.starts_with(b"{-") {
                depth += 1;
                self.index += 2;
            } else if self.starts_with(b"-}") {
                depth -= 1;
                self.index += 2;
            } else {
                self.consume_char();
            }
        }
    }

    fn token(&self, kind: TokenKind, start: usize, end: usize) -> Token {
        Token {
            kind,
            value: self.source[start..end].to_string(),
            span: Span::new(start as u32, end as u32),
        }
    }

    fn string_token(&self, start: usize, content_start: usize, content_end: usize) -> Token {
        Token {
            kind: TokenKind::String,
            value: self.source[content_start..content_end].to_string(),
            span: Span::new(start as u32, self.index as u32),
        }
    }

    // Covers the opening quote up to where lexing gave up.
    fn unclosed_string(&self, start: usize) -> CoreError {
        CoreError::LexError {
            span: Span::new(start as u32, self.index as u32),
            message: "Unclosed String".to_string(),
        }
    }

    fn starts_with(&self, prefix: &[u8]) -> bool {
        self.chars[self.index..].starts_with(prefix)
    }

    fn peek_char(&self) -> Option<u8> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.chars.get(self.index + offset).copied()
    }

    fn consume_char(&mut self) {
        if self.index < self.len {
            self.index += 1;
        }
    }
}

fn is_end_of_line(ch: u8) -> bool {
    ch == b'\n' || ch == b'\r'
}

fn is_whitespace(ch: u8) -> bool {
    ch <= b' ' && !is_end_of_line(ch)
}

fn is_letter(ch: u8) -> bool {
    ch.is_ascii_alphabetic()
}

fn is_digit(ch: u8) -> bool {
    ch.is_ascii_digit()
}

fn is_name_character(ch: u8) -> bool {
    ch == b'_' || is_letter(ch) || is_digit(ch)
}

fn is_delimiter(ch: u8) -> bool {
    DELIMITERS.contains(&ch)
}

fn is_symbol(ch: u8) -> bool {
    !is_digit(ch) && !is_letter(ch) && !is_whitespace(ch) && !is_end_of_line(ch) && !is_delimiter(ch)
}
