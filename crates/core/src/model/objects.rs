//! COS object types.

use super::operator::Operator;
use crate::codec::crypt::{DecryptFilter, DecryptReader};
use crate::error::{PdfError, Result};
use crate::io::SeekableStream;
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::fmt;
use std::io::{self, Read};

/// A PDF name without its leading slash. Bytes outside ASCII are kept as
/// Latin-1 code points.
pub type Name = SmolStr;

/// Dictionary mapping names to objects.
pub type Dict = IndexMap<Name, CosObject>;

/// Object number and generation of an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub objid: u32,
    pub genno: u16,
}

impl ObjectKey {
    pub const fn new(objid: u32, genno: u16) -> Self {
        Self { objid, genno }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.objid, self.genno)
    }
}

/// COS Object types - the fundamental value type in PDF.
#[derive(Debug, Clone, PartialEq)]
pub enum CosObject {
    /// Null object
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Real (floating point) value
    Real(f64),
    /// Name object (e.g., /Type, /Font)
    Name(Name),
    /// Literal or hex string
    String(CosString),
    /// Array of objects
    Array(Vec<Self>),
    /// Dictionary (name -> object mapping)
    Dict(Dict),
    /// Stream (dictionary + byte source)
    Stream(Box<CosStream>),
    /// Content-stream operator
    Operator(Operator),
    /// Indirect object reference
    Ref(ObjectKey),
}

impl CosObject {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(self.type_error("bool")),
        }
    }

    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            _ => Err(self.type_error("int")),
        }
    }

    pub const fn as_real(&self) -> Result<f64> {
        match self {
            Self::Real(n) => Ok(*n),
            _ => Err(self.type_error("real")),
        }
    }

    /// Numeric value, with integers widened to f64.
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(self.type_error("number")),
        }
    }

    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(name) => Ok(name.as_str()),
            _ => Err(self.type_error("name")),
        }
    }

    /// Decoded bytes of a string object.
    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Self::String(s) => Ok(s.as_bytes()),
            _ => Err(self.type_error("string")),
        }
    }

    pub const fn as_string(&self) -> Result<&CosString> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(self.type_error("string")),
        }
    }

    pub const fn as_array(&self) -> Result<&Vec<Self>> {
        match self {
            Self::Array(items) => Ok(items),
            _ => Err(self.type_error("array")),
        }
    }

    pub const fn as_dict(&self) -> Result<&Dict> {
        match self {
            Self::Dict(dict) => Ok(dict),
            _ => Err(self.type_error("dict")),
        }
    }

    pub fn as_stream(&self) -> Result<&CosStream> {
        match self {
            Self::Stream(stream) => Ok(stream),
            _ => Err(self.type_error("stream")),
        }
    }

    pub const fn as_operator(&self) -> Result<&Operator> {
        match self {
            Self::Operator(op) => Ok(op),
            _ => Err(self.type_error("operator")),
        }
    }

    pub const fn as_ref(&self) -> Result<ObjectKey> {
        match self {
            Self::Ref(key) => Ok(*key),
            _ => Err(self.type_error("reference")),
        }
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Operator(_) => "operator",
            Self::Ref(_) => "reference",
        }
    }

    const fn type_error(&self, expected: &'static str) -> PdfError {
        PdfError::TypeError {
            expected,
            got: self.type_name(),
        }
    }
}

impl From<CosString> for CosObject {
    fn from(s: CosString) -> Self {
        Self::String(s)
    }
}

impl From<Operator> for CosObject {
    fn from(op: Operator) -> Self {
        Self::Operator(op)
    }
}

/// A string object together with how it was written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CosString {
    bytes: Vec<u8>,
    is_hex: bool,
    hex_count: usize,
    only_hex: bool,
}

impl CosString {
    /// A `( ... )` string.
    pub fn literal(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            ..Self::default()
        }
    }

    /// A `< ... >` string. `hex_count` is the number of hex digits read and
    /// `only_hex` is false when the body contained non-hex, non-space bytes.
    pub fn hex(bytes: Vec<u8>, hex_count: usize, only_hex: bool) -> Self {
        Self {
            bytes,
            is_hex: true,
            hex_count,
            only_hex,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Replace the payload, keeping the lexical flags.
    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
    }

    pub fn is_hex(&self) -> bool {
        self.is_hex
    }

    pub fn hex_count(&self) -> usize {
        self.hex_count
    }

    pub fn contains_only_hex(&self) -> bool {
        self.only_hex
    }
}

/// Where a stream's raw (pre-filter) bytes come from.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamData {
    /// Bytes read as stored.
    Raw(SeekableStream),
    /// Bytes decrypted on the fly as they are read.
    Encrypted {
        source: SeekableStream,
        filter: DecryptFilter,
    },
}

impl StreamData {
    pub fn source(&self) -> &SeekableStream {
        match self {
            Self::Raw(source) | Self::Encrypted { source, .. } => source,
        }
    }
}

/// A stream object: dictionary plus a byte source.
#[derive(Debug, Clone, PartialEq)]
pub struct CosStream {
    pub dict: Dict,
    data: StreamData,
}

impl CosStream {
    pub fn new(dict: Dict, source: SeekableStream) -> Self {
        Self {
            dict,
            data: StreamData::Raw(source),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CosObject> {
        self.dict.get(name)
    }

    pub fn data(&self) -> &StreamData {
        &self.data
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.data, StreamData::Encrypted { .. })
    }

    /// Decrypt raw bytes lazily through `filter` from now on. A stream that
    /// already carries a filter is left as is.
    pub fn set_decrypt_filter(&mut self, filter: DecryptFilter) -> Result<()> {
        if let StreamData::Raw(source) = &self.data {
            let source = source.share()?;
            self.data = StreamData::Encrypted { source, filter };
        }
        Ok(())
    }

    /// A fresh reader over the raw bytes from their start, decrypting when a
    /// filter is attached.
    pub fn raw_reader(&self) -> Result<RawReader> {
        let mut source = self.data.source().share()?;
        source.seek(0);
        Ok(match &self.data {
            StreamData::Raw(_) => RawReader::Plain(source),
            StreamData::Encrypted { filter, .. } => RawReader::Decrypting(filter.wrap(source)?),
        })
    }

    /// All raw bytes, decrypted when a filter is attached.
    pub fn read_raw(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.raw_reader()?.read_to_end(&mut out)?;
        Ok(out)
    }
}

/// Reader returned by [`CosStream::raw_reader`].
pub enum RawReader {
    Plain(SeekableStream),
    Decrypting(DecryptReader<SeekableStream>),
}

impl Read for RawReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.read(buf),
            Self::Decrypting(reader) => reader.read(buf),
        }
    }
}
