use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};

/// Tokens of the `.tir` S-expression format.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Lexeme {
    LParen,
    RParen,
    /// Identifier or operator symbol: `kernel`, `float16x4`, `A`, `+`, `<=`.
    Atom(String),
    Int(i64),
    Float(f64),
    Str(String),
    Eof,
}

impl Lexeme {
    pub(crate) fn describe(&self) -> String {
        match self {
            Lexeme::LParen => "'('".to_string(),
            Lexeme::RParen => "')'".to_string(),
            Lexeme::Atom(s) => format!("'{}'", s),
            Lexeme::Int(v) => format!("integer {}", v),
            Lexeme::Float(v) => format!("float {}", v),
            Lexeme::Str(s) => format!("string \"{}\"", s),
            Lexeme::Eof => "end of file".to_string(),
        }
    }
}

pub(crate) struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub(crate) fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn tokenize(mut self) -> (Vec<Spanned<Lexeme>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node == Lexeme::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Spanned<Lexeme> {
        loop {
            self.skip_whitespace_and_comments();

            if self.pos >= self.source.len() {
                return self.make_token(Lexeme::Eof, self.pos, self.pos);
            }

            let start = self.pos;
            let ch = self.source[self.pos];

            match ch {
                b'(' => {
                    self.pos += 1;
                    return self.make_token(Lexeme::LParen, start, self.pos);
                }
                b')' => {
                    self.pos += 1;
                    return self.make_token(Lexeme::RParen, start, self.pos);
                }
                b'"' => {
                    if let Some(tok) = self.scan_string(start) {
                        return tok;
                    }
                }
                _ if ch.is_ascii_digit() => return self.scan_number(start),
                b'-' if self.peek_is_digit(1) => return self.scan_number(start),
                _ if is_atom_byte(ch) => return self.scan_atom(start),
                _ => {
                    self.pos += 1;
                    self.diagnostics.push(Diagnostic::error(
                        format!("unexpected character '{}'", ch as char),
                        Span::new(start as u32, self.pos as u32),
                    ));
                }
            }
        }
    }

    fn peek_is_digit(&self, offset: usize) -> bool {
        self.source
            .get(self.pos + offset)
            .is_some_and(|b| b.is_ascii_digit())
    }

    /// Whitespace and `;` line comments.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos < self.source.len() && self.source[self.pos] == b';' {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn scan_atom(&mut self, start: usize) -> Spanned<Lexeme> {
        while self.pos < self.source.len() && is_atom_byte(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        self.make_token(Lexeme::Atom(text), start, self.pos)
    }

    fn scan_number(&mut self, start: usize) -> Spanned<Lexeme> {
        if self.source[self.pos] == b'-' {
            self.pos += 1;
        }
        let mut is_float = false;
        while self.pos < self.source.len() {
            let b = self.source[self.pos];
            if b.is_ascii_digit() {
                self.pos += 1;
            } else if b == b'.' || b == b'e' || b == b'E' {
                is_float = true;
                self.pos += 1;
                if (b == b'e' || b == b'E')
                    && self.pos < self.source.len()
                    && (self.source[self.pos] == b'-' || self.source[self.pos] == b'+')
                {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        let span = Span::new(start as u32, self.pos as u32);
        let token = if is_float {
            match text.parse::<f64>() {
                Ok(v) => Lexeme::Float(v),
                Err(_) => {
                    self.diagnostics.push(Diagnostic::error(
                        format!("invalid float literal '{}'", text),
                        span,
                    ));
                    Lexeme::Float(0.0)
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => Lexeme::Int(v),
                Err(_) => {
                    self.diagnostics.push(
                        Diagnostic::error(format!("integer literal '{}' out of range", text), span)
                            .with_help("integer literals must fit in a signed 64-bit value".to_string()),
                    );
                    Lexeme::Int(0)
                }
            }
        };
        Spanned::new(token, span)
    }

    fn scan_string(&mut self, start: usize) -> Option<Spanned<Lexeme>> {
        self.pos += 1; // opening quote
        let mut text = String::new();
        while self.pos < self.source.len() {
            match self.source[self.pos] {
                b'"' => {
                    self.pos += 1;
                    return Some(self.make_token(Lexeme::Str(text), start, self.pos));
                }
                b'\\' if self.pos + 1 < self.source.len() => {
                    let escaped = self.source[self.pos + 1];
                    text.push(match escaped {
                        b'n' => '\n',
                        b't' => '\t',
                        other => other as char,
                    });
                    self.pos += 2;
                }
                b'\n' => break,
                b => {
                    text.push(b as char);
                    self.pos += 1;
                }
            }
        }
        self.diagnostics.push(Diagnostic::error(
            "unterminated string literal".to_string(),
            Span::new(start as u32, self.pos as u32),
        ));
        None
    }

    fn make_token(&self, token: Lexeme, start: usize, end: usize) -> Spanned<Lexeme> {
        Spanned::new(token, Span::new(start as u32, end as u32))
    }
}

fn is_atom_byte(ch: u8) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            b'_' | b'.' | b'+' | b'-' | b'*' | b'/' | b'%' | b'<' | b'>' | b'=' | b'!' | b'&'
                | b'|' | b'^'
        )
}
