//! Recursive COS object reader.
//!
//! Reads one full object at the current position. At top level a number is
//! never merged with what follows; inside arrays and dictionaries
//! `<num> <gen> R` is read as an indirect reference.

use super::lexer::{Lexer, Token};
use crate::config::DEFAULT_MAX_NESTING_DEPTH;
use crate::error::{PdfError, Result};
use crate::io::SeekableStream;
use crate::model::objects::{CosObject, CosStream, Dict, Name, ObjectKey};

const ENDSTREAM: &[u8] = b"endstream";

/// Reads COS objects from a seekable stream.
pub struct ObjectReader {
    lexer: Lexer,
    depth: usize,
    max_depth: usize,
}

impl ObjectReader {
    pub fn new(source: SeekableStream) -> Self {
        Self {
            lexer: Lexer::new(source),
            depth: 0,
            max_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    /// Limit on arrays and dictionaries open at once. Deeper input is a
    /// syntax error.
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn lexer(&mut self) -> &mut Lexer {
        &mut self.lexer
    }

    pub fn source(&self) -> &SeekableStream {
        self.lexer.source()
    }

    pub fn source_mut(&mut self) -> &mut SeekableStream {
        self.lexer.source_mut()
    }

    pub fn into_source(self) -> SeekableStream {
        self.lexer.into_source()
    }

    pub fn offset(&self) -> u64 {
        self.lexer.offset()
    }

    pub fn seek(&mut self, offset: u64) {
        self.lexer.seek(offset);
    }

    /// Parse one full object at the current position. A dictionary followed
    /// by the `stream` keyword is read as a stream object.
    pub fn read_object(&mut self) -> Result<CosObject> {
        let obj = self.read_value(false)?;
        if let CosObject::Dict(dict) = obj {
            return self.read_stream_after(dict);
        }
        Ok(obj)
    }

    /// Parse `<< ... >>`. Entries whose key is not a name are skipped.
    pub fn read_dictionary(&mut self) -> Result<Dict> {
        self.enter_container()?;
        let dict = self.read_dictionary_entries();
        self.depth -= 1;
        dict
    }

    fn read_dictionary_entries(&mut self) -> Result<Dict> {
        self.lexer.skip_whitespace()?;
        self.lexer.expect_byte(b'<')?;
        self.lexer.expect_byte(b'<')?;
        let mut dict = Dict::new();

        loop {
            self.lexer.skip_whitespace()?;
            match self.lexer.peek()? {
                None => return Err(PdfError::UnexpectedEof),
                Some(b'>') => {
                    self.lexer.source_mut().next_byte()?;
                    if self.lexer.peek()? == Some(b'>') {
                        self.lexer.source_mut().next_byte()?;
                    }
                    return Ok(dict);
                }
                Some(b'/') => {
                    let key = self.lexer.read_name()?;
                    self.lexer.skip_whitespace()?;
                    if self.lexer.peek()? == Some(b'>') {
                        // key without value
                        tracing::trace!(key = %key, "dictionary key without value");
                        dict.insert(key, CosObject::Null);
                        continue;
                    }
                    let value = self.read_value(true)?;
                    dict.insert(key, value);
                }
                Some(_) => {
                    let pos = self.offset();
                    let skipped = self.lexer.next_token()?;
                    tracing::debug!(pos, ?skipped, "skipping non-name dictionary key");
                }
            }
        }
    }

    /// Parse `[ ... ]`.
    pub fn read_array(&mut self) -> Result<Vec<CosObject>> {
        self.enter_container()?;
        let items = self.read_array_items();
        self.depth -= 1;
        items
    }

    fn read_array_items(&mut self) -> Result<Vec<CosObject>> {
        self.lexer.skip_whitespace()?;
        self.lexer.expect_byte(b'[')?;
        let mut items = Vec::new();
        loop {
            self.lexer.skip_whitespace()?;
            match self.lexer.peek()? {
                None => return Err(PdfError::UnexpectedEof),
                Some(b']') => {
                    self.lexer.source_mut().next_byte()?;
                    return Ok(items);
                }
                Some(_) => items.push(self.read_value(true)?),
            }
        }
    }

    fn enter_container(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(PdfError::syntax(
                self.offset(),
                format!("objects nested deeper than {}", self.max_depth),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn read_name(&mut self) -> Result<Name> {
        self.lexer.skip_whitespace()?;
        self.lexer.read_name()
    }

    fn read_value(&mut self, allow_refs: bool) -> Result<CosObject> {
        self.lexer.skip_whitespace()?;
        let pos = self.offset();
        let Some(b) = self.lexer.peek()? else {
            return Err(PdfError::UnexpectedEof);
        };

        match b {
            b'<' => {
                self.lexer.source_mut().next_byte()?;
                let is_dict = self.lexer.peek()? == Some(b'<');
                self.lexer.source_mut().unread();
                if is_dict {
                    Ok(CosObject::Dict(self.read_dictionary()?))
                } else {
                    Ok(CosObject::String(self.lexer.read_hex_string()?))
                }
            }
            b'[' => Ok(CosObject::Array(self.read_array()?)),
            b'(' => Ok(CosObject::String(self.lexer.read_literal_string()?)),
            b'/' => Ok(CosObject::Name(self.lexer.read_name()?)),
            b'+' | b'-' | b'.' | b'0'..=b'9' => match self.lexer.read_number()? {
                Token::Int(n) if allow_refs => self.try_reference(n),
                Token::Int(n) => Ok(CosObject::Int(n)),
                Token::Real(n) => Ok(CosObject::Real(n)),
                other => Err(PdfError::syntax(pos, format!("expected number, got {other:?}"))),
            },
            _ => {
                let word = self.lexer.read_until_delimiter()?;
                match word.as_slice() {
                    b"null" => Ok(CosObject::Null),
                    b"true" => Ok(CosObject::Bool(true)),
                    b"false" => Ok(CosObject::Bool(false)),
                    b"" => Err(PdfError::syntax(
                        pos,
                        format!("unexpected character {:?}", char::from(b)),
                    )),
                    other => Err(PdfError::syntax(
                        pos,
                        format!("unexpected keyword {}", String::from_utf8_lossy(other)),
                    )),
                }
            }
        }
    }

    /// After reading integer `objid`, look ahead for `<gen> R`.
    fn try_reference(&mut self, objid: i64) -> Result<CosObject> {
        let after_first = self.offset();
        self.lexer.skip_whitespace()?;
        if self.lexer.next_is_digit()? {
            if let Token::Int(genno) = self.lexer.read_number()? {
                self.lexer.skip_whitespace()?;
                if self.lexer.peek()? == Some(b'R') {
                    self.lexer.source_mut().next_byte()?;
                    let at_boundary = self
                        .lexer
                        .peek()?
                        .is_none_or(|c| super::lexer::is_whitespace(c) || super::lexer::is_delimiter(c));
                    if at_boundary
                        && let (Ok(objid), Ok(genno)) = (u32::try_from(objid), u16::try_from(genno))
                    {
                        return Ok(CosObject::Ref(ObjectKey::new(objid, genno)));
                    }
                }
            }
        }
        self.seek(after_first);
        Ok(CosObject::Int(objid))
    }

    /// Turn `dict` into a stream if the `stream` keyword follows it.
    fn read_stream_after(&mut self, dict: Dict) -> Result<CosObject> {
        let after_dict = self.offset();
        self.lexer.skip_whitespace()?;
        if self.lexer.read_until_delimiter()? != b"stream" {
            self.seek(after_dict);
            return Ok(CosObject::Dict(dict));
        }

        // The keyword is followed by CRLF or LF.
        let source = self.lexer.source_mut();
        if source.peek()? == Some(b'\r') {
            source.next_byte()?;
        }
        if source.peek()? == Some(b'\n') {
            source.next_byte()?;
        }
        let start = source.offset();

        let declared = dict
            .get("Length")
            .and_then(|len| len.as_int().ok())
            .and_then(|len| u64::try_from(len).ok())
            .filter(|&len| self.endstream_follows(start.saturating_add(len)).unwrap_or(false));
        let len = match declared {
            Some(len) => len,
            None => {
                tracing::debug!(start, "stream /Length unusable, scanning for endstream");
                self.scan_for_endstream(start)?
            }
        };

        let data = self.source().substream(start, len)?;
        self.seek(start + len);
        self.lexer.skip_whitespace()?;
        if self.lexer.read_until_delimiter()? != ENDSTREAM {
            return Err(PdfError::syntax(self.offset(), "expected endstream"));
        }
        Ok(CosObject::Stream(Box::new(CosStream::new(dict, data))))
    }

    fn endstream_follows(&mut self, end: u64) -> Result<bool> {
        let saved = self.offset();
        self.seek(end);
        self.lexer.skip_whitespace()?;
        let found = self.lexer.read_until_delimiter()? == ENDSTREAM;
        self.seek(saved);
        Ok(found)
    }

    /// Length of the data between `start` and the next `endstream`, without
    /// the end-of-line marker before it.
    fn scan_for_endstream(&mut self, start: u64) -> Result<u64> {
        let source = self.lexer.source_mut();
        source.seek(start);
        let mut matched = 0;
        let end = loop {
            let Some(b) = source.next_byte()? else {
                return Err(PdfError::UnexpectedEof);
            };
            matched = if b == ENDSTREAM[matched] {
                matched + 1
            } else if b == ENDSTREAM[0] {
                1
            } else {
                0
            };
            if matched == ENDSTREAM.len() {
                break source.offset() - ENDSTREAM.len() as u64;
            }
        };

        let mut len = end - start;
        source.seek(end);
        for eol in [b'\n', b'\r'] {
            if len > 0 {
                source.seek(start + len - 1);
                if source.peek()? == Some(eol) {
                    len -= 1;
                }
            }
        }
        Ok(len)
    }
}
