//! Signature byte-range extraction.
//!
//! Given the offset of a signature dictionary's indirect object, locate the
//! `/Contents` value without decoding it and compute the `/ByteRange` a
//! signer would have hashed: everything from the start of the file up to the
//! value, and everything after it up to the next `%%EOF`.

use super::object_reader::ObjectReader;
use super::offsets::OffsetTable;
use crate::config::ReaderOptions;
use crate::error::{PdfError, Result};
use crate::io::SeekableStream;
use crate::model::objects::{CosObject, ObjectKey};
use std::collections::HashSet;

const EOF_MARKER: &[u8; 5] = b"%%EOF";

/// `(start1, len1, start2, len2)` covering the signed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange([u64; 4]);

impl ByteRange {
    pub const fn new(start1: u64, len1: u64, start2: u64, len2: u64) -> Self {
        Self([start1, len1, start2, len2])
    }

    pub const fn as_array(&self) -> [u64; 4] {
        self.0
    }

    pub const fn start1(&self) -> u64 {
        self.0[0]
    }

    pub const fn len1(&self) -> u64 {
        self.0[1]
    }

    pub const fn start2(&self) -> u64 {
        self.0[2]
    }

    pub const fn len2(&self) -> u64 {
        self.0[3]
    }

    /// Total number of signed bytes.
    pub const fn covered_len(&self) -> u64 {
        self.0[1] + self.0[3]
    }

    /// Check the spans are ordered, disjoint and inside a file of
    /// `file_len` bytes.
    pub fn validate(&self, file_len: u64) -> Result<()> {
        let [s1, l1, s2, l2] = self.0;
        let end1 = s1.checked_add(l1);
        let end2 = s2.checked_add(l2);
        match (end1, end2) {
            (Some(end1), Some(end2)) if end1 <= s2 && end2 <= file_len => Ok(()),
            _ => Err(PdfError::syntax(
                s2,
                format!("byte range {:?} does not fit a file of {file_len} bytes", self.0),
            )),
        }
    }

    /// The signed bytes: both spans concatenated. The cursor of `stream` is
    /// restored afterwards.
    pub fn signed_bytes(&self, stream: &mut SeekableStream) -> Result<Vec<u8>> {
        self.validate(stream.len())?;
        let saved = stream.offset();
        let mut out = Vec::with_capacity(self.covered_len() as usize);
        for (start, len) in [(self.0[0], self.0[1]), (self.0[2], self.0[3])] {
            let mut span = stream.substream(start, len)?;
            out.extend_from_slice(&span.read_remaining()?);
            span.close();
        }
        stream.seek(saved);
        Ok(out)
    }
}

/// Computes signature byte ranges over one document stream.
pub struct SignatureRangeExtractor<T> {
    reader: ObjectReader,
    table: T,
    options: ReaderOptions,
    visited: HashSet<u64>,
}

impl<T: OffsetTable> SignatureRangeExtractor<T> {
    pub fn new(source: SeekableStream, table: T) -> Self {
        Self::with_options(source, table, ReaderOptions::default())
    }

    pub fn with_options(source: SeekableStream, table: T, options: ReaderOptions) -> Self {
        Self {
            reader: ObjectReader::new(source).with_max_nesting_depth(options.max_nesting_depth),
            table,
            options,
            visited: HashSet::new(),
        }
    }

    pub fn into_source(self) -> SeekableStream {
        self.reader.into_source()
    }

    /// Byte range of the signature dictionary whose `<num> <gen> obj` header
    /// starts at `offset`. `None` when the dictionary ends, or stops being a
    /// sequence of `/Name value` pairs, before `/Contents` is found.
    pub fn byte_range_at(&mut self, offset: u64) -> Result<Option<ByteRange>> {
        self.visited.clear();
        self.reader.seek(offset);
        self.skip_object_header()?;

        let Some((start, end)) = self.find_contents()? else {
            return Ok(None);
        };
        let eof = self.next_eof_offset(end)?;
        let len2 = (eof + 1).saturating_sub(end);
        Ok(Some(ByteRange::new(0, start, end, len2)))
    }

    /// `<num> <gen> obj`, each part optional.
    fn skip_object_header(&mut self) -> Result<()> {
        let lexer = self.reader.lexer();
        for _ in 0..2 {
            lexer.skip_whitespace()?;
            if !lexer.next_is_digit()? {
                return Ok(());
            }
            lexer.read_number()?;
        }
        lexer.skip_whitespace()?;
        if lexer.peek()? == Some(b'o') {
            lexer.expect_byte(b'o')?;
            lexer.expect_byte(b'b')?;
            lexer.expect_byte(b'j')?;
        }
        Ok(())
    }

    fn find_contents(&mut self) -> Result<Option<(u64, u64)>> {
        let lexer = self.reader.lexer();
        lexer.skip_whitespace()?;
        lexer.expect_byte(b'<')?;
        lexer.expect_byte(b'<')?;

        loop {
            let lexer = self.reader.lexer();
            lexer.skip_whitespace()?;
            match lexer.peek()? {
                Some(b'/') => {
                    let name = self.reader.read_name()?;
                    if name == "Contents" {
                        return self.value_range(0).map(Some);
                    }
                    self.skip_value()?;
                }
                Some(b'>') => return Ok(None),
                other => {
                    tracing::debug!(
                        offset = self.reader.offset(),
                        byte = ?other.map(char::from),
                        "signature dictionary entry does not start with a name"
                    );
                    return Ok(None);
                }
            }
        }
    }

    /// Skip one dictionary value, including `<num> <gen> R`.
    fn skip_value(&mut self) -> Result<()> {
        let first_pos = self.reader.offset();
        let first = self.reader.read_object()?;
        self.reader.lexer().skip_whitespace()?;
        if !self.reader.lexer().next_is_digit()? {
            return Ok(());
        }
        let gen_pos = self.reader.offset();
        let generation = self.reader.read_object()?;
        self.reader.lexer().skip_whitespace()?;
        self.reader.lexer().expect_byte(b'R')?;
        Self::reference_key(&first, first_pos, &generation, gen_pos)?;
        Ok(())
    }

    /// Offsets before and after the value at the cursor. Indirect values are
    /// followed through the offset table.
    fn value_range(&mut self, depth: usize) -> Result<(u64, u64)> {
        self.reader.lexer().skip_whitespace()?;
        let start = self.reader.offset();
        let first = self.reader.read_object()?;
        let end = self.reader.offset();

        self.reader.lexer().skip_whitespace()?;
        if !self.reader.lexer().next_is_digit()? {
            return Ok((start, end));
        }
        let gen_pos = self.reader.offset();
        let generation = self.reader.read_object()?;
        self.reader.lexer().skip_whitespace()?;

        let marker_pos = self.reader.offset();
        match self.reader.source_mut().next_byte()? {
            Some(b'R') => {
                let key = Self::reference_key(&first, start, &generation, gen_pos)?;
                self.follow_reference(key, depth)
            }
            Some(b'o') => {
                self.reader.lexer().expect_byte(b'b')?;
                self.reader.lexer().expect_byte(b'j')?;
                self.reader.lexer().skip_whitespace()?;
                let start = self.reader.offset();
                self.reader.read_object()?;
                Ok((start, self.reader.offset()))
            }
            Some(b) => Err(PdfError::syntax(
                marker_pos,
                format!("expected \"R\" or \"obj\", got {:?}", char::from(b)),
            )),
            None => Err(PdfError::UnexpectedEof),
        }
    }

    fn follow_reference(&mut self, key: ObjectKey, depth: usize) -> Result<(u64, u64)> {
        if depth >= self.options.max_reference_depth {
            return Err(PdfError::ReferenceDepth {
                depth: self.options.max_reference_depth,
            });
        }
        let offset = self
            .table
            .offset_of(key)
            .ok_or(PdfError::ObjectNotFound {
                objid: key.objid,
                genno: key.genno,
            })?
            + self.table.header_offset();
        if !self.visited.insert(offset) {
            return Err(PdfError::ReferenceCycle { offset });
        }
        tracing::trace!(%key, offset, "following indirect /Contents");
        self.reader.seek(offset);
        self.value_range(depth + 1)
    }

    fn reference_key(
        number: &CosObject,
        number_pos: u64,
        generation: &CosObject,
        gen_pos: u64,
    ) -> Result<ObjectKey> {
        let unexpected = |obj: &CosObject, pos| PdfError::UnexpectedType {
            pos,
            expected: "int",
            got: obj.type_name(),
        };
        let objid = number.as_int().map_err(|_| unexpected(number, number_pos))?;
        let genno = generation
            .as_int()
            .map_err(|_| unexpected(generation, gen_pos))?;
        match (u32::try_from(objid), u16::try_from(genno)) {
            (Ok(objid), Ok(genno)) => Ok(ObjectKey::new(objid, genno)),
            _ => Err(PdfError::syntax(
                number_pos,
                format!("object key {objid} {genno} out of range"),
            )),
        }
    }

    /// Offset of the `F` of the first `%%EOF` at or after `from`, or of the
    /// last byte when there is none.
    fn next_eof_offset(&mut self, from: u64) -> Result<u64> {
        let source = self.reader.source_mut();
        let mut window = [0u8; EOF_MARKER.len()];
        let mut pos = from;
        loop {
            source.seek(pos);
            let mut filled = 0;
            while filled < window.len() {
                let n = source.read_into(&mut window[filled..])?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled < window.len() {
                return Ok(source.len().saturating_sub(1));
            }
            if &window == EOF_MARKER {
                return Ok(pos + EOF_MARKER.len() as u64 - 1);
            }
            pos += 1;
        }
    }
}
