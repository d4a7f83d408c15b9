//! Tokenizer for filter expressions.

use crate::ast::Segment;
use crate::error::ParseError;
use serde_json::Number;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Path(Vec<Segment>),
    Number(Number),
    Str(String),
    True,
    False,
    Null,
    Function(String),
    LParen,
    RParen,
    Comma,
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
}

/// A token and the byte offset it starts at.
pub(crate) type Spanned = (Token, usize);

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    Lexer {
        src: source.as_bytes(),
        source,
        pos: 0,
    }
    .run()
}

struct Lexer<'a> {
    src: &'a [u8],
    source: &'a str,
    pos: usize,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl Lexer<'_> {
    fn run(mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
                continue;
            }
            let start = self.pos;
            let token = match b {
                b'.' => self.path()?,
                b'0'..=b'9' => self.number()?,
                b'"' | b'\'' => Token::Str(self.string()?),
                b'$' => {
                    self.pos += 1;
                    let name = self.ident();
                    if name.is_empty() {
                        return Err(ParseError::new(start, "expected function name after '$'"));
                    }
                    Token::Function(name)
                }
                b if is_ident_start(b) => match self.ident().as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    other => {
                        return Err(ParseError::new(
                            start,
                            format!("unexpected identifier '{other}' (fields start with '.')"),
                        ))
                    }
                },
                _ => self.operator()?,
            };
            tokens.push((token, start));
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        if self.peek().is_some_and(is_ident_start) {
            self.pos += 1;
            while self.peek().is_some_and(is_ident_continue) {
                self.pos += 1;
            }
        }
        self.source[start..self.pos].to_string()
    }

    fn operator(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        let two = (self.peek(), self.peek_at(1));
        let (token, width) = match two {
            (Some(b'|'), Some(b'|')) => (Token::Or, 2),
            (Some(b'&'), Some(b'&')) => (Token::And, 2),
            (Some(b'='), Some(b'=')) => (Token::Eq, 2),
            (Some(b'!'), Some(b'=')) => (Token::Ne, 2),
            (Some(b'<'), Some(b'=')) => (Token::Le, 2),
            (Some(b'>'), Some(b'=')) => (Token::Ge, 2),
            (Some(b'<'), _) => (Token::Lt, 1),
            (Some(b'>'), _) => (Token::Gt, 1),
            (Some(b'!'), _) => (Token::Bang, 1),
            (Some(b'+'), _) => (Token::Plus, 1),
            (Some(b'-'), _) => (Token::Minus, 1),
            (Some(b'*'), _) => (Token::Star, 1),
            (Some(b'/'), _) => (Token::Slash, 1),
            (Some(b'%'), _) => (Token::Percent, 1),
            (Some(b'('), _) => (Token::LParen, 1),
            (Some(b')'), _) => (Token::RParen, 1),
            (Some(b','), _) => (Token::Comma, 1),
            _ => {
                let ch = self.source[start..].chars().next().unwrap_or('?');
                return Err(ParseError::new(start, format!("unexpected character '{ch}'")));
            }
        };
        self.pos += width;
        Ok(token)
    }

    fn path(&mut self) -> Result<Token, ParseError> {
        let mut segments = Vec::new();
        // The leading dot alone is the whole document.
        self.pos += 1;
        if self.peek().is_some_and(is_ident_start) {
            segments.push(Segment::Field(self.ident()));
        }
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(b'['), _) => segments.push(self.bracket()?),
                (Some(b'.'), Some(b'[')) => {
                    self.pos += 1;
                    segments.push(self.bracket()?);
                }
                (Some(b'.'), Some(b)) if is_ident_start(b) => {
                    self.pos += 1;
                    segments.push(Segment::Field(self.ident()));
                }
                _ => break,
            }
        }
        Ok(Token::Path(segments))
    }

    fn bracket(&mut self) -> Result<Segment, ParseError> {
        let open = self.pos;
        self.pos += 1;
        self.skip_whitespace();
        let segment = match self.peek() {
            Some(b'"' | b'\'') => Segment::Field(self.string()?),
            Some(b'0'..=b'9') => {
                let start = self.pos;
                while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
                let index = self.source[start..self.pos]
                    .parse::<usize>()
                    .map_err(|_| ParseError::new(start, "array index out of range"))?;
                Segment::Index(index)
            }
            _ => {
                return Err(ParseError::new(
                    self.pos,
                    "expected an index or a quoted key inside '[]'",
                ))
            }
        };
        self.skip_whitespace();
        if self.peek() != Some(b']') {
            return Err(ParseError::new(open, "unclosed '['"));
        }
        self.pos += 1;
        Ok(segment)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn number(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        let mut is_float = false;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mut lookahead = 1;
            if matches!(self.peek_at(1), Some(b'+' | b'-')) {
                lookahead = 2;
            }
            if self.peek_at(lookahead).is_some_and(|b| b.is_ascii_digit()) {
                is_float = true;
                self.pos += lookahead;
                while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }

        let text = &self.source[start..self.pos];
        let number = if is_float {
            text.parse::<f64>().ok().and_then(Number::from_f64)
        } else {
            text.parse::<u64>()
                .ok()
                .map(Number::from)
                .or_else(|| text.parse::<f64>().ok().and_then(Number::from_f64))
        };
        number
            .map(Token::Number)
            .ok_or_else(|| ParseError::new(start, format!("invalid number '{text}'")))
    }

    fn string(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let quote = self.src[self.pos];
        self.pos += 1;
        let mut out = String::new();
        loop {
            let rest = &self.source[self.pos..];
            let Some(ch) = rest.chars().next() else {
                return Err(ParseError::new(start, "unterminated string"));
            };
            self.pos += ch.len_utf8();
            match ch {
                c if c as u32 == u32::from(quote) => return Ok(out),
                '\\' => {
                    let escape_at = self.pos - 1;
                    let Some(next) = self.source[self.pos..].chars().next() else {
                        return Err(ParseError::new(start, "unterminated string"));
                    };
                    self.pos += next.len_utf8();
                    match next {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '\\' | '/' | '"' | '\'' => out.push(next),
                        'u' => {
                            let hex = self
                                .source
                                .get(self.pos..self.pos + 4)
                                .ok_or_else(|| ParseError::new(escape_at, "short \\u escape"))?;
                            let decoded = u32::from_str_radix(hex, 16)
                                .ok()
                                .and_then(char::from_u32)
                                .ok_or_else(|| ParseError::new(escape_at, "invalid \\u escape"))?;
                            self.pos += 4;
                            out.push(decoded);
                        }
                        other => {
                            return Err(ParseError::new(
                                escape_at,
                                format!("unknown escape '\\{other}'"),
                            ))
                        }
                    }
                }
                c => out.push(c),
            }
        }
    }
}
