//! Object offset lookup.
//!
//! [`OffsetTable`] is how the signature extractor resolves indirect
//! references. [`ObjectOffsets`] is a map-backed table that can be built by
//! scanning a file for `<num> <gen> obj` headers when no cross-reference
//! data is at hand.

use super::lexer::is_whitespace;
use crate::error::Result;
use crate::io::SeekableStream;
use crate::model::objects::ObjectKey;
use std::collections::HashMap;

const SCAN_CHUNK: usize = 64 * 1024;
/// Bytes re-read from the previous chunk so headers split across chunk
/// boundaries are still seen whole.
const SCAN_OVERLAP: usize = 32;
const HEADER_SEARCH: usize = 1024;

/// Resolves indirect-object keys to byte offsets.
pub trait OffsetTable {
    /// Offset of `key`'s `<num> <gen> obj` header, relative to the header
    /// offset.
    fn offset_of(&self, key: ObjectKey) -> Option<u64>;

    /// Offset of the `%PDF-` header within the file.
    fn header_offset(&self) -> u64 {
        0
    }
}

/// Offsets keyed by object number and generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectOffsets {
    offsets: HashMap<ObjectKey, u64>,
    header_offset: u64,
}

impl ObjectOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header_offset(mut self, header_offset: u64) -> Self {
        self.header_offset = header_offset;
        self
    }

    pub fn insert(&mut self, key: ObjectKey, offset: u64) {
        self.offsets.insert(key, offset);
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Entries sorted by offset.
    pub fn entries(&self) -> Vec<(ObjectKey, u64)> {
        let mut entries: Vec<_> = self.offsets.iter().map(|(&k, &v)| (k, v)).collect();
        entries.sort_by_key(|&(key, offset)| (offset, key));
        entries
    }

    /// Best-effort scan of `stream` for object headers. Later definitions of
    /// the same key replace earlier ones. The cursor is restored afterwards.
    pub fn scan(stream: &mut SeekableStream) -> Result<Self> {
        let saved = stream.offset();
        let mut table = Self::default();
        let mut buf = vec![0u8; SCAN_CHUNK];
        let mut base = 0u64;
        let mut accept_from = 0u64;

        loop {
            stream.seek(base);
            let mut filled = 0;
            while filled < buf.len() {
                let n = stream.read_into(&mut buf[filled..])?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            let chunk = &buf[..filled];
            let at_end = filled < buf.len();

            if base == 0 {
                let window = &chunk[..chunk.len().min(HEADER_SEARCH)];
                if let Some(pos) = window.windows(5).position(|w| w == b"%PDF-") {
                    table.header_offset = pos as u64;
                }
            }

            let mut i = 0;
            while let Some(found) = find(&chunk[i..], b"obj") {
                let idx = i + found;
                i = idx + 1;
                let abs = base + idx as u64;
                if abs < accept_from {
                    continue;
                }
                // Need the byte after "obj" unless the file ends here.
                if idx + 3 >= chunk.len() && !at_end {
                    break;
                }
                if let Some((key, start)) = header_before(chunk, idx) {
                    let offset = (base + start as u64).saturating_sub(table.header_offset);
                    table.offsets.insert(key, offset);
                }
            }

            if at_end {
                break;
            }
            accept_from = base + filled as u64 - 3;
            base = accept_from.saturating_sub(SCAN_OVERLAP as u64).max(base + 1);
        }

        tracing::debug!(
            objects = table.offsets.len(),
            header_offset = table.header_offset,
            "scanned object headers"
        );
        stream.seek(saved);
        Ok(table)
    }
}

impl OffsetTable for ObjectOffsets {
    fn offset_of(&self, key: ObjectKey) -> Option<u64> {
        self.offsets.get(&key).copied()
    }

    fn header_offset(&self) -> u64 {
        self.header_offset
    }
}

impl<T: OffsetTable + ?Sized> OffsetTable for &T {
    fn offset_of(&self, key: ObjectKey) -> Option<u64> {
        (**self).offset_of(key)
    }

    fn header_offset(&self) -> u64 {
        (**self).header_offset()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parse `<num> <gen> ` backwards from the `obj` keyword at `idx`.
fn header_before(chunk: &[u8], idx: usize) -> Option<(ObjectKey, usize)> {
    if chunk
        .get(idx + 3)
        .is_some_and(|&b| !is_whitespace(b) && !super::lexer::is_delimiter(b))
    {
        return None;
    }

    let mut pos = idx;
    let gen_end = skip_back_whitespace(chunk, pos)?;
    if gen_end == pos {
        return None;
    }
    let gen_start = skip_back_digits(chunk, gen_end);
    if gen_start == gen_end {
        return None;
    }
    pos = gen_start;
    let num_end = skip_back_whitespace(chunk, pos)?;
    if num_end == pos {
        return None;
    }
    let num_start = skip_back_digits(chunk, num_end);
    if num_start == num_end {
        return None;
    }
    if num_start > 0 && !is_whitespace(chunk[num_start - 1]) {
        return None;
    }

    let objid = std::str::from_utf8(&chunk[num_start..num_end]).ok()?.parse().ok()?;
    let genno = std::str::from_utf8(&chunk[gen_start..gen_end]).ok()?.parse().ok()?;
    Some((ObjectKey::new(objid, genno), num_start))
}

fn skip_back_whitespace(chunk: &[u8], mut pos: usize) -> Option<usize> {
    while pos > 0 && is_whitespace(chunk[pos - 1]) {
        pos -= 1;
    }
    (pos > 0).then_some(pos)
}

fn skip_back_digits(chunk: &[u8], mut pos: usize) -> usize {
    while pos > 0 && chunk[pos - 1].is_ascii_digit() {
        pos -= 1;
    }
    pos
}
