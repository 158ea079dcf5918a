//! carousel - the COS object layer of a PDF reader.
//!
//! Reference-counted seekable streams, a content-stream tokenizer, signature
//! byte-range extraction and the standard security handler.

pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod io;
pub mod model;
pub mod parser;

// Re-export the main entry points
pub use config::ReaderOptions;
pub use document::{EncryptionDict, StandardSecurityHandler};
pub use io::SeekableStream;
pub use model::{CosObject, CosStream, CosString, Dict, Name, ObjectKey, Operator};
pub use parser::{ByteRange, ContentTokenizer, ObjectOffsets, OffsetTable, SignatureRangeExtractor};

pub use error::{PdfError, Result};
