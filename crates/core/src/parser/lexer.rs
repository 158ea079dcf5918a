//! Elementary COS tokenizer reading through a [`SeekableStream`].
//!
//! Produces numbers, literal and hex strings, names and bare keywords.
//! Composite objects are assembled by [`super::object_reader`].

use crate::error::{PdfError, Result};
use crate::io::SeekableStream;
use crate::model::objects::{CosString, Name};

/// Lexical token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer value
    Int(i64),
    /// Floating point value
    Real(f64),
    /// Literal `( ... )` or hex `< ... >` string
    String(CosString),
    /// Name (e.g., /Name)
    Name(Name),
    /// Keyword, operator or structural delimiter (`[`, `<<`, ...)
    Keyword(Vec<u8>),
}

pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
}

pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_keyword_end(b: u8) -> bool {
    is_whitespace(b) || is_delimiter(b)
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Names keep non-ASCII bytes as Latin-1 code points.
pub(crate) fn name_from_bytes(bytes: &[u8]) -> Name {
    bytes.iter().map(|&b| char::from(b)).collect::<String>().into()
}

/// Tokenizer over a seekable stream.
pub struct Lexer {
    source: SeekableStream,
}

impl Lexer {
    pub fn new(source: SeekableStream) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &SeekableStream {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut SeekableStream {
        &mut self.source
    }

    pub fn into_source(self) -> SeekableStream {
        self.source
    }

    /// Current position in stream
    pub fn offset(&self) -> u64 {
        self.source.offset()
    }

    pub fn seek(&mut self, offset: u64) {
        self.source.seek(offset);
    }

    pub fn peek(&mut self) -> Result<Option<u8>> {
        self.source.peek()
    }

    /// Skip whitespace and `%` comments.
    pub fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(b) = self.source.peek()? {
            if b == b'%' {
                while let Some(c) = self.source.next_byte()? {
                    if c == b'\r' || c == b'\n' {
                        break;
                    }
                }
                continue;
            }
            if !is_whitespace(b) {
                break;
            }
            self.source.next_byte()?;
        }
        Ok(())
    }

    /// Whether the next byte is an ASCII digit.
    pub fn next_is_digit(&mut self) -> Result<bool> {
        Ok(self.source.peek()?.is_some_and(|b| b.is_ascii_digit()))
    }

    /// Consume `expected` or fail with the offending byte and offset.
    pub fn expect_byte(&mut self, expected: u8) -> Result<()> {
        let pos = self.source.offset();
        match self.source.next_byte()? {
            Some(b) if b == expected => Ok(()),
            Some(b) => Err(PdfError::UnexpectedChar {
                pos,
                expected: char::from(expected),
                found: char::from(b),
            }),
            None => Err(PdfError::UnexpectedEof),
        }
    }

    /// Bytes up to the next whitespace or delimiter.
    pub fn read_until_delimiter(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(b) = self.source.peek()? {
            if is_keyword_end(b) {
                break;
            }
            out.push(b);
            self.source.next_byte()?;
        }
        Ok(out)
    }

    /// Parse a name (`/Name`), resolving `#xx` escapes.
    pub fn read_name(&mut self) -> Result<Name> {
        self.expect_byte(b'/')?;
        let mut name = Vec::new();

        while let Some(b) = self.source.peek()? {
            if is_keyword_end(b) {
                break;
            }
            self.source.next_byte()?;
            if b != b'#' {
                name.push(b);
                continue;
            }
            let escape = self.source.offset();
            let h1 = self.source.next_byte()?.and_then(hex_value);
            let h2 = self.source.next_byte()?.and_then(hex_value);
            match (h1, h2) {
                (Some(high), Some(low)) => name.push((high << 4) | low),
                _ => {
                    // Invalid escape: drop '#', keep what follows
                    self.source.seek(escape);
                }
            }
        }

        Ok(name_from_bytes(&name))
    }

    /// Parse an integer or real. A lone sign or dot reads as zero.
    pub fn read_number(&mut self) -> Result<Token> {
        let mut text = Vec::new();
        let mut has_dot = false;
        let mut has_digit = false;

        if let Some(sign @ (b'+' | b'-')) = self.source.peek()? {
            text.push(sign);
            self.source.next_byte()?;
        }
        while let Some(b) = self.source.peek()? {
            if b.is_ascii_digit() {
                has_digit = true;
            } else if b == b'.' && !has_dot {
                has_dot = true;
            } else {
                break;
            }
            text.push(b);
            self.source.next_byte()?;
        }

        if !has_digit {
            tracing::trace!(
                offset = self.source.offset(),
                "number without digits read as 0"
            );
            return Ok(Token::Int(0));
        }

        // Only ASCII digits, sign and dot were collected.
        let text = String::from_utf8_lossy(&text);
        if !has_dot {
            if let Ok(val) = text.parse::<i64>() {
                return Ok(Token::Int(val));
            }
        }
        text.parse::<f64>()
            .map(Token::Real)
            .map_err(|_| PdfError::syntax(self.source.offset(), format!("invalid number {text}")))
    }

    /// Parse a literal string `( ... )` with escapes and balanced parentheses.
    pub fn read_literal_string(&mut self) -> Result<CosString> {
        self.expect_byte(b'(')?;
        let mut result = Vec::new();
        let mut depth = 1;

        while depth > 0 {
            match self.source.read_byte()? {
                b'(' => {
                    depth += 1;
                    result.push(b'(');
                }
                b')' => {
                    depth -= 1;
                    if depth > 0 {
                        result.push(b')');
                    }
                }
                b'\\' => match self.source.read_byte()? {
                    b'n' => result.push(b'\n'),
                    b'r' => result.push(b'\r'),
                    b't' => result.push(b'\t'),
                    b'b' => result.push(0x08),
                    b'f' => result.push(0x0c),
                    b'(' => result.push(b'('),
                    b')' => result.push(b')'),
                    b'\\' => result.push(b'\\'),
                    b'\r' => {
                        // Line continuation - skip \r and optional \n
                        if self.source.peek()? == Some(b'\n') {
                            self.source.next_byte()?;
                        }
                    }
                    b'\n' => {}
                    c @ b'0'..=b'7' => {
                        let mut octal = u32::from(c - b'0');
                        for _ in 0..2 {
                            match self.source.peek()? {
                                Some(d @ b'0'..=b'7') => {
                                    self.source.next_byte()?;
                                    octal = octal * 8 + u32::from(d - b'0');
                                }
                                _ => break,
                            }
                        }
                        result.push((octal & 0xFF) as u8);
                    }
                    c => result.push(c),
                },
                c => result.push(c),
            }
        }

        Ok(CosString::literal(result))
    }

    /// Parse a hex string `< ... >`. An odd final digit is padded with 0.
    pub fn read_hex_string(&mut self) -> Result<CosString> {
        self.expect_byte(b'<')?;
        let mut result = Vec::new();
        let mut pending: Option<u8> = None;
        let mut hex_count = 0;
        let mut only_hex = true;

        loop {
            match self.source.read_byte()? {
                b'>' => break,
                c if is_whitespace(c) => {}
                c => match hex_value(c) {
                    Some(nibble) => {
                        hex_count += 1;
                        match pending.take() {
                            Some(high) => result.push((high << 4) | nibble),
                            None => pending = Some(nibble),
                        }
                    }
                    None => only_hex = false,
                },
            }
        }

        if let Some(high) = pending {
            result.push(high << 4);
        }

        Ok(CosString::hex(result, hex_count, only_hex))
    }

    /// Next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace()?;
        let Some(b) = self.source.peek()? else {
            return Ok(None);
        };

        let token = match b {
            b'/' => Token::Name(self.read_name()?),
            b'(' => Token::String(self.read_literal_string()?),
            b'<' | b'>' => {
                self.source.next_byte()?;
                if self.source.peek()? == Some(b) {
                    self.source.next_byte()?;
                    Token::Keyword(vec![b, b])
                } else if b == b'<' {
                    self.source.unread();
                    Token::String(self.read_hex_string()?)
                } else {
                    Token::Keyword(vec![b])
                }
            }
            b'[' | b']' | b'{' | b'}' | b')' => {
                self.source.next_byte()?;
                Token::Keyword(vec![b])
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number()?,
            _ => Token::Keyword(self.read_until_delimiter()?),
        };
        Ok(Some(token))
    }
}
