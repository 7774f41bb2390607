//! Tokens, the line-tracked expression scanner, and `{{ … }}` segmentation.
//!
//! Word-shaped operators (`or`, `is not`, …) surface as identifiers; the
//! parser resolves them against the operator table. Punctuation operators are
//! longest-matched against the symbols registered at engine construction, so
//! extensions contributing new symbols need no lexer changes.

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    /// A punctuation operator symbol such as `+`, `==`, or `..`.
    Op(String),
    LeftParen,
    RightParen,
    Comma,
    Dot,
    Assign,
}

impl TokenKind {
    /// Short description used in parse diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Int(i) => format!("number '{i}'"),
            TokenKind::Float(x) => format!("number '{x}'"),
            TokenKind::Str(s) => format!("string \"{s}\""),
            TokenKind::Ident(name) => format!("'{name}'"),
            TokenKind::Op(symbol) => format!("'{symbol}'"),
            TokenKind::LeftParen => "'('".to_string(),
            TokenKind::RightParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Assign => "'='".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
}

/// One piece of a template: literal text, or the inside of a `{{ … }}`
/// interpolation with the line its opening delimiter sits on.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSegment {
    Text(String),
    Expression { text: String, line: u32 },
}

/// Split template source into text and expression segments.
///
/// Delimiter scanning is quote-aware, so `}}` inside a string literal does
/// not terminate the segment.
pub fn segment(source: &str, template: &str) -> Result<Vec<RawSegment>, ParseError> {
    let mut segments = Vec::new();
    let mut line: u32 = 1;
    let mut text = String::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '{' && chars.peek() == Some(&'{') {
            chars.next();
            if !text.is_empty() {
                segments.push(RawSegment::Text(std::mem::take(&mut text)));
            }
            let start_line = line;
            let mut expr = String::new();
            let mut quote: Option<char> = None;
            loop {
                let Some(c) = chars.next() else {
                    return Err(ParseError::new(
                        "unclosed '{{' delimiter",
                        template,
                        start_line,
                    ));
                };
                if c == '\n' {
                    line += 1;
                }
                match quote {
                    Some(q) => {
                        expr.push(c);
                        if c == '\\' {
                            if let Some(escaped) = chars.next() {
                                if escaped == '\n' {
                                    line += 1;
                                }
                                expr.push(escaped);
                            }
                        } else if c == q {
                            quote = None;
                        }
                    }
                    None => {
                        if c == '}' && chars.peek() == Some(&'}') {
                            chars.next();
                            break;
                        }
                        if c == '\'' || c == '"' {
                            quote = Some(c);
                        }
                        expr.push(c);
                    }
                }
            }
            segments.push(RawSegment::Expression {
                text: expr,
                line: start_line,
            });
        } else {
            if c == '\n' {
                line += 1;
            }
            text.push(c);
        }
    }
    if !text.is_empty() {
        segments.push(RawSegment::Text(text));
    }
    Ok(segments)
}

/// Tokenize one expression segment.
///
/// `symbols` is the full set of registered operator symbols; word-shaped
/// entries are ignored here (they arrive as identifiers).
pub fn tokenize(
    text: &str,
    template: &str,
    start_line: u32,
    symbols: &[String],
) -> Result<Vec<Token>, ParseError> {
    let mut punct: Vec<&str> = symbols
        .iter()
        .map(String::as_str)
        .filter(|s| !s.starts_with(|c: char| c.is_ascii_alphabetic()))
        .collect();
    punct.sort_by_key(|s| std::cmp::Reverse(s.len()));

    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut line = start_line;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\n' => {
                line += 1;
                i += 1;
            }
            b' ' | b'\t' | b'\r' => {
                i += 1;
            }
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let mut is_float = false;
                // A '.' starts a fraction only when a single dot precedes a
                // digit; `1..3` keeps the range operator intact.
                if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
                    is_float = true;
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let literal = &text[start..i];
                let kind = if is_float {
                    match literal.parse::<f64>() {
                        Ok(x) => TokenKind::Float(x),
                        Err(_) => {
                            return Err(ParseError::new(
                                format!("invalid number literal '{literal}'"),
                                template,
                                line,
                            ));
                        }
                    }
                } else {
                    match literal.parse::<i64>() {
                        Ok(n) => TokenKind::Int(n),
                        // Integer literals beyond i64 fall back to the float tier.
                        Err(_) => match literal.parse::<f64>() {
                            Ok(x) => TokenKind::Float(x),
                            Err(_) => {
                                return Err(ParseError::new(
                                    format!("invalid number literal '{literal}'"),
                                    template,
                                    line,
                                ));
                            }
                        },
                    }
                };
                tokens.push(Token { kind, line });
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(text[start..i].to_string()),
                    line,
                });
            }
            b'\'' | b'"' => {
                let quote = b;
                let start_line_of_string = line;
                i += 1;
                let mut buf: Vec<u8> = Vec::new();
                let mut closed = false;
                while i < bytes.len() {
                    let c = bytes[i];
                    if c == b'\\' && i + 1 < bytes.len() {
                        let escaped = bytes[i + 1];
                        buf.push(match escaped {
                            b'n' => b'\n',
                            b't' => b'\t',
                            b'r' => b'\r',
                            other => other,
                        });
                        if escaped == b'\n' {
                            line += 1;
                        }
                        i += 2;
                        continue;
                    }
                    if c == quote {
                        closed = true;
                        i += 1;
                        break;
                    }
                    if c == b'\n' {
                        line += 1;
                    }
                    buf.push(c);
                    i += 1;
                }
                if !closed {
                    return Err(ParseError::new(
                        "unterminated string literal",
                        template,
                        start_line_of_string,
                    ));
                }
                tokens.push(Token {
                    kind: TokenKind::Str(String::from_utf8_lossy(&buf).into_owned()),
                    line: start_line_of_string,
                });
            }
            _ => {
                if let Some(symbol) = punct
                    .iter()
                    .find(|s| text[i..].starts_with(**s))
                    .copied()
                {
                    tokens.push(Token {
                        kind: TokenKind::Op(symbol.to_string()),
                        line,
                    });
                    i += symbol.len();
                } else {
                    let kind = match b {
                        b'(' => Some(TokenKind::LeftParen),
                        b')' => Some(TokenKind::RightParen),
                        b',' => Some(TokenKind::Comma),
                        b'.' => Some(TokenKind::Dot),
                        b'=' => Some(TokenKind::Assign),
                        _ => None,
                    };
                    match kind {
                        Some(kind) => {
                            tokens.push(Token { kind, line });
                            i += 1;
                        }
                        None => {
                            let c = text[i..].chars().next().unwrap_or('?');
                            return Err(ParseError::new(
                                format!("unexpected character '{c}'"),
                                template,
                                line,
                            ));
                        }
                    }
                }
            }
        }
    }
    Ok(tokens)
}

/// Peekable cursor over one expression's tokens.
#[derive(Debug)]
pub struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
    last_line: u32,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>, start_line: u32) -> Self {
        let last_line = tokens.last().map_or(start_line, |t| t.line);
        Self {
            tokens,
            pos: 0,
            last_line,
        }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    pub fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Line of the current token, or of the last token once exhausted.
    pub fn line(&self) -> u32 {
        self.peek().map_or(self.last_line, |t| t.line)
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}
